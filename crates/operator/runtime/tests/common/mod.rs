//! Shared fixtures: an in-memory remote peer and a few local operators

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use operator_runtime::remote::{ChunkStream, RemoteClient};
use operator_runtime::{ExecutionContext, Operator, OperatorRuntime, RemoteOperator, Result};
use operator_types::wire::{
    ChunkClass, ExecuteRequest, ExecuteResponse, GeneratorChunk, ListOperatorsRequest,
    ListOperatorsResponse, Placement, PlacementsResponse,
};
use operator_types::{ExecutionOptions, ObjectType, OperatorConfig, OperatorUri, Property};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type ChunkSender = UnboundedSender<Result<GeneratorChunk>>;

/// Remote peer backed by in-memory state
#[derive(Default)]
pub struct FakePeer {
    pub descriptors: Mutex<Vec<Value>>,
    pub load_errors: Mutex<Vec<Value>>,
    pub execute_response: Mutex<ExecuteResponse>,
    pub execute_calls: Mutex<Vec<ExecuteRequest>>,
    pub streams: Mutex<VecDeque<UnboundedReceiver<Result<GeneratorChunk>>>>,
    pub options: Mutex<ExecutionOptions>,
    pub schema: Mutex<Option<Value>>,
}

impl FakePeer {
    pub fn with_descriptors(descriptors: Vec<Value>) -> Arc<Self> {
        let peer = Self::default();
        *peer.descriptors.lock().unwrap() = descriptors;
        Arc::new(peer)
    }

    /// Prepare the stream the next generator call will read from
    pub fn open_stream(&self) -> ChunkSender {
        let (tx, rx) = unbounded();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    pub fn execute_calls(&self) -> Vec<ExecuteRequest> {
        self.execute_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteClient for FakePeer {
    async fn list_operators(&self, _request: &ListOperatorsRequest) -> Result<ListOperatorsResponse> {
        Ok(ListOperatorsResponse {
            operators: self.descriptors.lock().unwrap().clone(),
            errors: self.load_errors.lock().unwrap().clone(),
        })
    }

    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse> {
        self.execute_calls.lock().unwrap().push(request.clone());
        Ok(self.execute_response.lock().unwrap().clone())
    }

    async fn execute_generator(&self, request: &ExecuteRequest) -> Result<ChunkStream> {
        self.execute_calls.lock().unwrap().push(request.clone());
        let stream = self.streams.lock().unwrap().pop_front();
        Ok(match stream {
            Some(rx) => rx.boxed(),
            None => futures::stream::empty().boxed(),
        })
    }

    async fn resolve_type(&self, _request: &ExecuteRequest) -> Result<Option<Value>> {
        Ok(self.schema.lock().unwrap().clone())
    }

    /// One placement per descriptor that decodes into an operator
    async fn resolve_placements(&self, _request: &ListOperatorsRequest) -> Result<PlacementsResponse> {
        let placements = self
            .descriptors
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| RemoteOperator::parse(d).ok())
            .map(|operator| Placement {
                operator_uri: operator.uri.to_string(),
                placement: json!({ "place": "samples-grid-actions" }),
            })
            .collect();
        Ok(PlacementsResponse { placements })
    }

    async fn resolve_execution_options(&self, _request: &ExecuteRequest) -> Result<ExecutionOptions> {
        Ok(self.options.lock().unwrap().clone())
    }
}

pub fn descriptor(uri: &str, config: Value) -> Value {
    json!({ "uri": uri, "config": config })
}

pub fn trigger_chunk(uri: &str) -> GeneratorChunk {
    GeneratorChunk {
        cls: ChunkClass::InvocationRequest,
        chunk_type: Some("invocation".into()),
        body: json!({ "operator_uri": uri, "params": {} }),
    }
}

pub fn result_chunk(result: Value) -> GeneratorChunk {
    GeneratorChunk {
        cls: ChunkClass::ExecutionResult,
        chunk_type: Some("result".into()),
        body: json!({ "result": result }),
    }
}

pub fn runtime_with_peer(peer: Arc<FakePeer>) -> Arc<OperatorRuntime> {
    Arc::new(
        OperatorRuntime::builder()
            .with_remote_client(peer)
            .build()
            .unwrap(),
    )
}

/// Poll `condition` until it holds, yielding to other tasks in between
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Local operators ──────────────────────────────────────────────────

/// Returns `{}` and does nothing else
pub struct Noop {
    uri: OperatorUri,
    config: OperatorConfig,
}

impl Noop {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            uri: OperatorUri::parse(name).unwrap(),
            config: OperatorConfig::new(name),
        })
    }
}

#[async_trait]
impl Operator for Noop {
    fn uri(&self) -> &OperatorUri {
        &self.uri
    }

    fn config(&self) -> &OperatorConfig {
        &self.config
    }

    async fn resolve_input(&self, _ctx: &ExecutionContext) -> anyhow::Result<Option<Property>> {
        Ok(Some(Property::empty_object()))
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<Value> {
        Ok(json!({}))
    }
}

/// Triggers itself on every run
pub struct Recurse {
    uri: OperatorUri,
    config: OperatorConfig,
}

impl Recurse {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            uri: OperatorUri::parse(name).unwrap(),
            config: OperatorConfig::new(name),
        })
    }
}

#[async_trait]
impl Operator for Recurse {
    fn uri(&self) -> &OperatorUri {
        &self.uri
    }

    fn config(&self) -> &OperatorConfig {
        &self.config
    }

    async fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<Value> {
        ctx.trigger(self.uri.as_str(), json!({}))?;
        Ok(json!({ "depth": ctx.depth }))
    }
}

/// Requires one named field and echoes which field it ran with
pub struct Requires {
    uri: OperatorUri,
    config: OperatorConfig,
    field: &'static str,
}

impl Requires {
    pub fn new(name: &str, field: &'static str) -> Arc<Self> {
        Arc::new(Self {
            uri: OperatorUri::parse(name).unwrap(),
            config: OperatorConfig::new(name),
            field,
        })
    }
}

#[async_trait]
impl Operator for Requires {
    fn uri(&self) -> &OperatorUri {
        &self.uri
    }

    fn config(&self) -> &OperatorConfig {
        &self.config
    }

    async fn resolve_input(&self, _ctx: &ExecutionContext) -> anyhow::Result<Option<Property>> {
        Ok(Some(Property::object(ObjectType::new().str(self.field, true))))
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<Value> {
        Ok(json!({ "ran": self.field }))
    }
}
