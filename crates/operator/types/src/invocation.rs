//! Invocation requests and the executor payload that carries them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-request execution options
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationOptions {
    /// Ask the peer to delegate instead of executing immediately
    #[serde(default)]
    pub request_delegation: bool,
    /// Orchestrator to delegate to, when more than one is registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_target: Option<String>,
    /// Caller does not want the output rendered
    #[serde(default)]
    pub skip_output: bool,
}

/// A request to run an operator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub operator_uri: String,
    #[serde(default = "empty_params")]
    pub params: Value,
    #[serde(default)]
    pub options: InvocationOptions,
    /// Trigger nesting depth; 0 for requests made by a caller
    #[serde(default)]
    pub depth: u32,
}

pub(crate) fn empty_params() -> Value {
    Value::Object(Map::new())
}

impl InvocationRequest {
    pub fn new(operator_uri: impl Into<String>, params: Value) -> Self {
        Self {
            operator_uri: operator_uri.into(),
            params: normalize_params(params),
            options: InvocationOptions::default(),
            depth: 0,
        }
    }

    pub fn with_options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }

    /// A request raised from inside an execution at `parent_depth`
    pub fn triggered(operator_uri: impl Into<String>, params: Value, parent_depth: u32) -> Self {
        Self {
            depth: parent_depth.saturating_add(1),
            ..Self::new(operator_uri, params)
        }
    }
}

/// Null params mean "no params"
pub fn normalize_params(params: Value) -> Value {
    if params.is_null() {
        empty_params()
    } else {
        params
    }
}

/// Serialized executor state returned by the remote peer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorPayload {
    #[serde(default)]
    pub requests: Vec<InvocationRequest>,
    #[serde(default)]
    pub logs: Vec<String>,
}
