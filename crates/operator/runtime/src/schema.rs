//! Input and output schema resolution
//!
//! Dynamic operators resolve their schemas for every invocation: local ones
//! through [`Operator::resolve_input`](crate::operator::Operator::resolve_input),
//! remote ones through the peer's resolve-type endpoint. Static local
//! operators resolve their input schema once and reuse it; static remote
//! operators carry theirs in the descriptor. A cached schema belongs to the
//! operator instance that produced it; registering another operator at the
//! same URI never reuses it. Otherwise the cache is only cleared when remote
//! descriptors are reloaded.

use crate::context::ExecutionContext;
use crate::error::DispatchError;
use crate::operator::{Operator, RemoteOperator, ResolvedOperator};
use crate::remote::RemoteClient;
use dashmap::DashMap;
use operator_types::wire::SchemaTarget;
use operator_types::{OperatorUri, Property};
use std::sync::Arc;

/// What a caller can render as an input form
#[derive(Clone, Debug, PartialEq)]
pub enum InputPrompt {
    /// Fully resolved input schema
    Ready(Property),
    /// The operator takes no inputs
    NoInputs,
    /// Schema resolution failed; nothing is renderable
    Unavailable { reason: String },
}

impl InputPrompt {
    pub fn is_ready(&self) -> bool {
        matches!(self, InputPrompt::Ready(_))
    }
}

/// Input schema cached for one static local operator
struct CachedInputs {
    operator: Arc<dyn Operator>,
    inputs: Option<Property>,
}

pub struct SchemaResolver {
    remote: Option<Arc<dyn RemoteClient>>,
    /// Resolved input schemas of static local operators
    static_inputs: DashMap<OperatorUri, CachedInputs>,
}

impl SchemaResolver {
    pub fn new(remote: Option<Arc<dyn RemoteClient>>) -> Self {
        Self {
            remote,
            static_inputs: DashMap::new(),
        }
    }

    /// Input schema for one invocation; `None` when the operator takes no inputs
    pub async fn resolve_input(
        &self,
        operator: &ResolvedOperator,
        ctx: &ExecutionContext,
    ) -> Result<Option<Property>, DispatchError> {
        match operator {
            ResolvedOperator::Local(local) => {
                let uri = local.uri();
                let dynamic = local.config().dynamic;
                if !dynamic {
                    if let Some(cached) = self.static_inputs.get(uri) {
                        if Arc::ptr_eq(&cached.operator, local) {
                            return Ok(cached.inputs.clone());
                        }
                    }
                }

                let resolved = local
                    .resolve_input(ctx)
                    .await
                    .map_err(|e| schema_error(uri, SchemaTarget::Inputs, format!("{:#}", e)))?;
                if !dynamic {
                    self.static_inputs.insert(
                        uri.clone(),
                        CachedInputs {
                            operator: local.clone(),
                            inputs: resolved.clone(),
                        },
                    );
                }
                Ok(resolved)
            }
            ResolvedOperator::Remote(remote) => {
                self.resolve_remote(remote, ctx, SchemaTarget::Inputs).await
            }
        }
    }

    /// Output schema for one invocation
    pub async fn resolve_output(
        &self,
        operator: &ResolvedOperator,
        ctx: &ExecutionContext,
    ) -> Result<Option<Property>, DispatchError> {
        match operator {
            ResolvedOperator::Local(local) => local
                .resolve_output(ctx)
                .await
                .map_err(|e| schema_error(local.uri(), SchemaTarget::Outputs, format!("{:#}", e))),
            ResolvedOperator::Remote(remote) => {
                self.resolve_remote(remote, ctx, SchemaTarget::Outputs).await
            }
        }
    }

    /// Input prompt for a caller; resolution failures disable the whole prompt
    pub async fn resolve_input_prompt(
        &self,
        operator: &ResolvedOperator,
        ctx: &ExecutionContext,
    ) -> InputPrompt {
        match self.resolve_input(operator, ctx).await {
            Ok(Some(property)) if !is_empty_object(&property) => InputPrompt::Ready(property),
            Ok(_) => InputPrompt::NoInputs,
            Err(e) => {
                tracing::warn!(operator_uri = %operator.uri(), error = %e, "Input prompt unavailable");
                InputPrompt::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Drop the cached schema for `uri`
    pub fn forget(&self, uri: &OperatorUri) -> bool {
        self.static_inputs.remove(uri).is_some()
    }

    /// Forget every cached static schema
    pub fn clear_cache(&self) {
        self.static_inputs.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.static_inputs.len()
    }

    async fn resolve_remote(
        &self,
        operator: &RemoteOperator,
        ctx: &ExecutionContext,
        target: SchemaTarget,
    ) -> Result<Option<Property>, DispatchError> {
        if !operator.config.dynamic {
            return Ok(match target {
                SchemaTarget::Inputs => operator.inputs.clone(),
                SchemaTarget::Outputs => operator.outputs.clone(),
            });
        }

        let client = self.remote.as_ref().ok_or_else(|| {
            schema_error(&operator.uri, target, "remote operators are not configured")
        })?;
        let request = ctx.to_execute_request(&operator.uri, Some(target));
        let raw = client
            .resolve_type(&request)
            .await
            .map_err(|e| schema_error(&operator.uri, target, e.to_string()))?;

        raw.map(|raw| Property::from_json(&raw, ""))
            .transpose()
            .map_err(|e| schema_error(&operator.uri, target, e.to_string()))
    }
}

fn schema_error(uri: &OperatorUri, target: SchemaTarget, reason: impl Into<String>) -> DispatchError {
    DispatchError::SchemaResolution {
        uri: uri.clone(),
        target: match target {
            SchemaTarget::Inputs => "inputs",
            SchemaTarget::Outputs => "outputs",
        },
        reason: reason.into(),
    }
}

fn is_empty_object(property: &Property) -> bool {
    property.as_object().map(|object| object.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use operator_types::{EnvironmentSnapshot, ObjectType, OperatorConfig};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        uri: OperatorUri,
        config: OperatorConfig,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Operator for Counting {
        fn uri(&self) -> &OperatorUri {
            &self.uri
        }

        fn config(&self) -> &OperatorConfig {
            &self.config
        }

        async fn resolve_input(&self, _ctx: &ExecutionContext) -> anyhow::Result<Option<Property>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("dataset has no label fields");
            }
            Ok(Some(Property::object(ObjectType::new().str("name", true))))
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    fn counting(config: OperatorConfig, fail: bool) -> Arc<Counting> {
        Arc::new(Counting {
            uri: OperatorUri::parse(&config.name).unwrap(),
            config,
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(json!({}), EnvironmentSnapshot::default())
    }

    #[tokio::test]
    async fn test_static_inputs_are_cached() {
        let resolver = SchemaResolver::new(None);
        let op = counting(OperatorConfig::new("static"), false);
        let resolved = ResolvedOperator::Local(op.clone());

        resolver.resolve_input(&resolved, &ctx()).await.unwrap();
        resolver.resolve_input(&resolved, &ctx()).await.unwrap();
        assert_eq!(op.calls.load(Ordering::SeqCst), 1);

        resolver.clear_cache();
        resolver.resolve_input(&resolved, &ctx()).await.unwrap();
        assert_eq!(op.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replaced_operator_does_not_reuse_cached_inputs() {
        let resolver = SchemaResolver::new(None);
        let first = counting(OperatorConfig::new("static"), false);
        let second = counting(OperatorConfig::new("static"), false);

        resolver.resolve_input(&ResolvedOperator::Local(first.clone()), &ctx()).await.unwrap();
        resolver.resolve_input(&ResolvedOperator::Local(second.clone()), &ctx()).await.unwrap();
        resolver.resolve_input(&ResolvedOperator::Local(second.clone()), &ctx()).await.unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);

        assert!(resolver.forget(second.uri()));
        assert!(!resolver.forget(second.uri()));
        assert_eq!(resolver.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_inputs_resolve_every_time() {
        let resolver = SchemaResolver::new(None);
        let op = counting(OperatorConfig::new("dyn").dynamic(), false);
        let resolved = ResolvedOperator::Local(op.clone());

        resolver.resolve_input(&resolved, &ctx()).await.unwrap();
        resolver.resolve_input(&resolved, &ctx()).await.unwrap();
        assert_eq!(op.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_resolution_disables_prompt() {
        let resolver = SchemaResolver::new(None);
        let resolved = ResolvedOperator::Local(counting(OperatorConfig::new("bad").dynamic(), true));

        match resolver.resolve_input_prompt(&resolved, &ctx()).await {
            InputPrompt::Unavailable { reason } => assert!(reason.contains("no label fields")),
            other => panic!("unexpected prompt: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_static_and_unconfigured_dynamic() {
        let resolver = SchemaResolver::new(None);
        let remote = RemoteOperator::parse(&json!({
            "uri": "@acme/tools/export",
            "config": { "name": "export" },
            "definition": { "inputs": { "type": { "name": "Object", "properties": {} } } }
        }))
        .unwrap();
        let resolved = ResolvedOperator::Remote(Arc::new(remote.clone()));
        assert_eq!(
            resolver.resolve_input_prompt(&resolved, &ctx()).await,
            InputPrompt::NoInputs
        );

        let mut dynamic = remote;
        dynamic.config.dynamic = true;
        let err = resolver
            .resolve_input(&ResolvedOperator::Remote(Arc::new(dynamic)), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::SchemaResolution { target: "inputs", .. }));
    }
}
