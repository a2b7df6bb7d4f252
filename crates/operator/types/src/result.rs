//! Outcome of one invocation

use crate::invocation::ExecutorPayload;
use crate::uri::OperatorUri;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable outcome of one dispatch
///
/// Execution failures are data here, never an `Err`: `error` carries the
/// failure and `error_message` an optional user-facing explanation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorResult {
    pub operator_uri: OperatorUri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Executor state accumulated during the run (already queued)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The peer accepted the request for delegated execution
    #[serde(default)]
    pub delegated: bool,
}

impl OperatorResult {
    pub fn success(operator_uri: OperatorUri, result: Option<Value>) -> Self {
        Self {
            operator_uri,
            result,
            executor: None,
            error: None,
            error_message: None,
            delegated: false,
        }
    }

    pub fn failure(operator_uri: OperatorUri, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::success(operator_uri, None)
        }
    }

    pub fn with_executor(mut self, executor: Option<ExecutorPayload>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_error_message(mut self, message: Option<String>) -> Self {
        self.error_message = message;
        self
    }

    pub fn with_delegated(mut self, delegated: bool) -> Self {
        self.delegated = delegated;
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the operator produced output worth showing
    pub fn has_output(&self) -> bool {
        match &self.result {
            None | Some(Value::Null) => false,
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
        }
    }

    /// Best explanation for a failure: the user-facing message first
    pub fn error_text(&self) -> Option<&str> {
        self.error_message.as_deref().or(self.error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uri() -> OperatorUri {
        OperatorUri::parse("noop").unwrap()
    }

    #[test]
    fn test_output_detection() {
        assert!(!OperatorResult::success(uri(), Some(json!({}))).has_output());
        assert!(!OperatorResult::success(uri(), None).has_output());
        assert!(OperatorResult::success(uri(), Some(json!({ "n": 1 }))).has_output());
        assert!(OperatorResult::success(uri(), Some(json!(3))).has_output());
    }

    #[test]
    fn test_error_text_prefers_message() {
        let result = OperatorResult::failure(uri(), "KeyError: 'x'")
            .with_error_message(Some("Field x is missing".into()));
        assert!(result.has_error());
        assert_eq!(result.error_text(), Some("Field x is missing"));
        assert_eq!(
            OperatorResult::failure(uri(), "boom").error_text(),
            Some("boom")
        );
    }
}
