//! Request and response shapes exchanged with the remote operator peer
//!
//! | Endpoint                                   | Request               | Response                   |
//! |--------------------------------------------|-----------------------|----------------------------|
//! | `POST /operators`                          | [`ListOperatorsRequest`] | [`ListOperatorsResponse`] |
//! | `POST /operators/execute`                  | [`ExecuteRequest`]    | [`ExecuteResponse`]        |
//! | `POST /operators/execute/generator`        | [`ExecuteRequest`]    | stream of [`GeneratorChunk`] |
//! | `POST /operators/resolve-type`             | [`ExecuteRequest`]    | schema JSON or `{error}`   |
//! | `POST /operators/resolve-placements`       | [`ListOperatorsRequest`] | [`PlacementsResponse`]  |
//! | `POST /operators/resolve-execution-options`| [`ExecuteRequest`]    | `ExecutionOptions`         |

use crate::config::OperatorConfig;
use crate::environment::EnvironmentSnapshot;
use crate::error::{OperatorError, Result};
use crate::invocation::{empty_params, ExecutorPayload, InvocationRequest};
use crate::schema::Property;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which schema a resolve-type call asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaTarget {
    Inputs,
    Outputs,
}

/// Body for execution-shaped calls: the environment plus invocation fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub operator_uri: String,
    #[serde(default = "empty_params")]
    pub params: Value,
    #[serde(flatten)]
    pub environment: EnvironmentSnapshot,
    #[serde(default)]
    pub request_delegation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegation_target: Option<String>,
    /// Only set for resolve-type calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SchemaTarget>,
}

/// Body for registry-wide calls
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOperatorsRequest {
    #[serde(flatten)]
    pub environment: EnvironmentSnapshot,
}

/// Synchronous execution response
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub executor: Option<ExecutorPayload>,
    #[serde(default)]
    pub delegated: bool,
}

/// Class tag on a streamed chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkClass {
    InvocationRequest,
    ExecutionResult,
    #[serde(other)]
    Unknown,
}

/// One chunk of a generator execution stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorChunk {
    pub cls: ChunkClass,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,
    #[serde(default)]
    pub body: Value,
}

/// Decoded meaning of a generator chunk
#[derive(Clone, Debug, PartialEq)]
pub enum GeneratorMessage {
    /// A triggered invocation to queue right away
    Trigger(InvocationRequest),
    /// The final (or latest) result of the stream
    Result(ExecuteResponse),
    /// A chunk class this runtime does not understand
    Ignored(Option<String>),
}

impl GeneratorChunk {
    pub fn decode(self) -> Result<GeneratorMessage> {
        match self.cls {
            ChunkClass::InvocationRequest => {
                Ok(GeneratorMessage::Trigger(serde_json::from_value(self.body)?))
            }
            ChunkClass::ExecutionResult => {
                Ok(GeneratorMessage::Result(serde_json::from_value(self.body)?))
            }
            ChunkClass::Unknown => Ok(GeneratorMessage::Ignored(self.chunk_type)),
        }
    }
}

/// Schema definitions carried by a remote descriptor
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorDefinition {
    #[serde(default)]
    pub inputs: Option<Value>,
    #[serde(default)]
    pub outputs: Option<Value>,
}

/// A remote operator as listed by the peer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub uri: String,
    #[serde(default)]
    pub plugin_name: Option<String>,
    pub config: OperatorConfig,
    #[serde(default)]
    pub definition: OperatorDefinition,
}

impl OperatorDescriptor {
    /// Decode one raw descriptor, including its static schemas
    pub fn parse(raw: &Value) -> Result<(Self, Option<Property>, Option<Property>)> {
        let descriptor: OperatorDescriptor = serde_json::from_value(raw.clone())
            .map_err(|e| OperatorError::InvalidDescriptor(e.to_string()))?;
        let inputs = descriptor
            .definition
            .inputs
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|v| Property::from_json(v, ""))
            .transpose()?;
        let outputs = descriptor
            .definition
            .outputs
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|v| Property::from_json(v, ""))
            .transpose()?;
        Ok((descriptor, inputs, outputs))
    }
}

/// Listing response; `errors` are plugin load failures on the peer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOperatorsResponse {
    #[serde(default)]
    pub operators: Vec<Value>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Where the host should surface an operator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub operator_uri: String,
    #[serde(default)]
    pub placement: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementsResponse {
    #[serde(default)]
    pub placements: Vec<Placement>,
}

/// A failure collected while loading operator descriptors
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitializationError {
    /// Descriptor URI, plugin path, or `"server"` when unknown
    pub source: String,
    pub message: String,
}

impl InitializationError {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }

    /// Interpret one entry of the peer's `errors[]`
    pub fn from_peer(raw: &Value) -> Self {
        let source = raw
            .get("path")
            .or_else(|| raw.get("source"))
            .and_then(Value::as_str)
            .unwrap_or("server");
        let message = match raw.get("errors").or_else(|| raw.get("message")) {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Array(messages)) => messages
                .iter()
                .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                .collect::<Vec<_>>()
                .join("; "),
            Some(other) => other.to_string(),
            None => raw.to_string(),
        };
        Self::new(source, message)
    }
}
