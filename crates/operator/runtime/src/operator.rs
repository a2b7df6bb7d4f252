//! Operators
//!
//! A local operator is any type implementing [`Operator`]; it runs
//! in-process. A [`RemoteOperator`] is the decoded descriptor of an operator
//! the peer executes; its dynamic schemas are resolved through the peer.

use crate::context::ExecutionContext;
use async_trait::async_trait;
use operator_types::{OperatorConfig, OperatorDescriptor, OperatorUri, Property};
use serde_json::Value;
use std::sync::Arc;

/// A unit of work executed in-process
#[async_trait]
pub trait Operator: Send + Sync {
    fn uri(&self) -> &OperatorUri;

    fn config(&self) -> &OperatorConfig;

    /// Input schema for this invocation; `None` means no inputs
    async fn resolve_input(&self, _ctx: &ExecutionContext) -> anyhow::Result<Option<Property>> {
        Ok(None)
    }

    /// Output schema for this invocation; `None` means no declared outputs
    async fn resolve_output(&self, _ctx: &ExecutionContext) -> anyhow::Result<Option<Property>> {
        Ok(None)
    }

    async fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<Value>;
}

/// An operator executed by the remote peer
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteOperator {
    pub uri: OperatorUri,
    pub plugin_name: Option<String>,
    pub config: OperatorConfig,
    /// Static input schema from the descriptor
    pub inputs: Option<Property>,
    /// Static output schema from the descriptor
    pub outputs: Option<Property>,
}

impl RemoteOperator {
    pub fn from_descriptor(
        descriptor: OperatorDescriptor,
        inputs: Option<Property>,
        outputs: Option<Property>,
    ) -> operator_types::Result<Self> {
        let uri = OperatorUri::parse(&descriptor.uri)?;
        Ok(Self {
            uri,
            plugin_name: descriptor.plugin_name,
            config: descriptor.config,
            inputs,
            outputs,
        })
    }

    /// Decode a raw descriptor as listed by the peer
    pub fn parse(raw: &Value) -> operator_types::Result<Self> {
        let (descriptor, inputs, outputs) = OperatorDescriptor::parse(raw)?;
        Self::from_descriptor(descriptor, inputs, outputs)
    }
}

/// Result of a registry lookup: which registry answered, and with what
#[derive(Clone)]
pub enum ResolvedOperator {
    Local(Arc<dyn Operator>),
    Remote(Arc<RemoteOperator>),
}

impl ResolvedOperator {
    pub fn uri(&self) -> &OperatorUri {
        match self {
            ResolvedOperator::Local(operator) => operator.uri(),
            ResolvedOperator::Remote(operator) => &operator.uri,
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        match self {
            ResolvedOperator::Local(operator) => operator.config(),
            ResolvedOperator::Remote(operator) => &operator.config,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ResolvedOperator::Remote(_))
    }
}

impl std::fmt::Debug for ResolvedOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedOperator")
            .field("uri", self.uri())
            .field("is_remote", &self.is_remote())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_remote_descriptor() {
        let remote = RemoteOperator::parse(&json!({
            "uri": "@acme/tools/export",
            "plugin_name": "@acme/tools",
            "config": { "name": "export", "execute_as_generator": true },
            "definition": {
                "inputs": { "type": { "name": "Object", "properties": {
                    "path": { "type": { "name": "String" }, "required": true }
                } } }
            }
        }))
        .unwrap();

        assert_eq!(remote.uri.as_str(), "@acme/tools/export");
        assert!(remote.config.execute_as_generator);
        assert!(remote.inputs.is_some());
        assert!(remote.outputs.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_config() {
        assert!(RemoteOperator::parse(&json!({ "uri": "@acme/tools/export" })).is_err());
    }
}
