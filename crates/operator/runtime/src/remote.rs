//! Remote operator peer
//!
//! [`RemoteClient`] is the seam between the runtime and the server that
//! lists and executes remote operators. [`HttpRemoteClient`] talks to it
//! over HTTP; every endpoint is a JSON `POST`. The generator endpoint
//! answers with newline-delimited JSON chunks.

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use operator_types::wire::{
    ExecuteRequest, ExecuteResponse, GeneratorChunk, ListOperatorsRequest, ListOperatorsResponse,
    PlacementsResponse,
};
use operator_types::ExecutionOptions;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const LIST_OPERATORS_PATH: &str = "/operators";
pub const EXECUTE_PATH: &str = "/operators/execute";
pub const EXECUTE_GENERATOR_PATH: &str = "/operators/execute/generator";
pub const RESOLVE_TYPE_PATH: &str = "/operators/resolve-type";
pub const RESOLVE_PLACEMENTS_PATH: &str = "/operators/resolve-placements";
pub const RESOLVE_EXECUTION_OPTIONS_PATH: &str = "/operators/resolve-execution-options";

/// Chunks of one streaming execution, in arrival order
pub type ChunkStream = BoxStream<'static, Result<GeneratorChunk>>;

/// Requests the runtime makes of the remote peer
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn list_operators(&self, request: &ListOperatorsRequest) -> Result<ListOperatorsResponse>;

    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse>;

    async fn execute_generator(&self, request: &ExecuteRequest) -> Result<ChunkStream>;

    /// Dynamic schema for `request.target`; `None` when the operator declares none
    async fn resolve_type(&self, request: &ExecuteRequest) -> Result<Option<Value>>;

    async fn resolve_placements(&self, request: &ListOperatorsRequest) -> Result<PlacementsResponse>;

    async fn resolve_execution_options(&self, request: &ExecuteRequest) -> Result<ExecutionOptions>;
}

/// HTTP implementation of [`RemoteClient`]
pub struct HttpRemoteClient {
    client: Client,
    base_url: String,
}

impl HttpRemoteClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send(path, body).await?;
        Ok(response.json().await?)
    }

    async fn send<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND {
            Err(RuntimeError::Api {
                status: status.as_u16(),
                message: format!("{} not found", path),
            })
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RuntimeError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list_operators(&self, request: &ListOperatorsRequest) -> Result<ListOperatorsResponse> {
        self.post(LIST_OPERATORS_PATH, request).await
    }

    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteResponse> {
        self.post(EXECUTE_PATH, request).await
    }

    async fn execute_generator(&self, request: &ExecuteRequest) -> Result<ChunkStream> {
        let response = self.send(EXECUTE_GENERATOR_PATH, request).await?;
        Ok(ndjson_chunks(response.bytes_stream().boxed()))
    }

    async fn resolve_type(&self, request: &ExecuteRequest) -> Result<Option<Value>> {
        let value: Value = self.post(RESOLVE_TYPE_PATH, request).await?;
        schema_from_response(value)
    }

    async fn resolve_placements(&self, request: &ListOperatorsRequest) -> Result<PlacementsResponse> {
        self.post(RESOLVE_PLACEMENTS_PATH, request).await
    }

    async fn resolve_execution_options(&self, request: &ExecuteRequest) -> Result<ExecutionOptions> {
        self.post(RESOLVE_EXECUTION_OPTIONS_PATH, request).await
    }
}

/// Interpret a resolve-type body: schema JSON, `null`, or `{"error": ...}`
pub fn schema_from_response(value: Value) -> Result<Option<Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(ref object) if object.contains_key("error") => {
            let message = match object.get("error") {
                Some(Value::String(message)) => message.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            Err(RuntimeError::Remote(message))
        }
        schema => Ok(Some(schema)),
    }
}

struct LineBuffer<S> {
    bytes: S,
    buffer: Vec<u8>,
    exhausted: bool,
}

/// Split a byte stream into newline-delimited generator chunks
///
/// Blank lines are skipped; a trailing line without a newline still counts.
pub fn ndjson_chunks<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    RuntimeError: From<E>,
{
    let state = LineBuffer {
        bytes,
        buffer: Vec::new(),
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(newline) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=newline).collect();
                if let Some(chunk) = parse_line(&line) {
                    return Some((chunk, state));
                }
                continue;
            }

            if state.exhausted {
                let rest = std::mem::take(&mut state.buffer);
                return parse_line(&rest).map(|chunk| (chunk, state));
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((Err(RuntimeError::from(e)), state));
                }
                None => state.exhausted = true,
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8]) -> Option<Result<GeneratorChunk>> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).map_err(RuntimeError::from))
}
