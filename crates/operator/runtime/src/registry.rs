//! Operator registry
//!
//! Two independent maps keyed by normalized URI: local operators run
//! in-process, remote operators are descriptors loaded from the peer.
//! Lookups prefer local, so registering a local operator shadows a remote
//! one with the same URI.

use crate::observer::lock;
use crate::operator::{Operator, RemoteOperator, ResolvedOperator};
use dashmap::DashMap;
use operator_types::wire::ListOperatorsResponse;
use operator_types::{InitializationError, OperatorError, OperatorUri, Result, DEFAULT_NAMESPACE};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Outcome of loading remote descriptors
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    /// Number of descriptors registered
    pub loaded: usize,
    pub errors: Vec<InitializationError>,
}

pub struct OperatorRegistry {
    namespace: String,
    local: DashMap<OperatorUri, Arc<dyn Operator>>,
    remote: DashMap<OperatorUri, Arc<RemoteOperator>>,
    /// Failures from the last descriptor load
    initialization_errors: Mutex<Vec<InitializationError>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    /// Registry resolving bare names into `namespace`
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: DashMap::new(),
            remote: DashMap::new(),
            initialization_errors: Mutex::new(Vec::new()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Normalize a raw URI, dropping any `#method` suffix
    pub fn resolve_uri(&self, raw: &str) -> Result<OperatorUri> {
        OperatorUri::parse_in(raw, &self.namespace)
    }

    // ── Local ────────────────────────────────────────────────────────

    /// Register a local operator, replacing any previous one at its URI
    pub fn register(&self, operator: Arc<dyn Operator>) {
        let uri = operator.uri().clone();
        if self.remote.contains_key(&uri) {
            tracing::debug!(operator_uri = %uri, "Local operator shadows remote operator");
        }
        self.local.insert(uri.clone(), operator);
        tracing::info!(operator_uri = %uri, "Local operator registered");
    }

    pub fn unregister(&self, uri: &OperatorUri) -> Option<Arc<dyn Operator>> {
        self.local.remove(uri).map(|(_, operator)| operator)
    }

    pub fn get_operator(&self, uri: &OperatorUri) -> Option<Arc<dyn Operator>> {
        self.local.get(uri).map(|entry| entry.value().clone())
    }

    pub fn operator_exists(&self, uri: &OperatorUri) -> bool {
        self.local.contains_key(uri)
    }

    // ── Remote ───────────────────────────────────────────────────────

    pub fn register_remote(&self, operator: RemoteOperator) {
        let uri = operator.uri.clone();
        self.remote.insert(uri, Arc::new(operator));
    }

    pub fn get_remote_operator(&self, uri: &OperatorUri) -> Option<Arc<RemoteOperator>> {
        self.remote.get(uri).map(|entry| entry.value().clone())
    }

    pub fn remote_operator_exists(&self, uri: &OperatorUri) -> bool {
        self.remote.contains_key(uri)
    }

    /// Replace the remote registry with a freshly listed set of descriptors
    ///
    /// Descriptors that fail to decode, and the peer's own load errors, are
    /// collected as initialization errors; every other descriptor still
    /// registers.
    pub fn load_descriptors(&self, response: ListOperatorsResponse) -> LoadReport {
        let mut errors: Vec<InitializationError> =
            response.errors.iter().map(InitializationError::from_peer).collect();

        let mut parsed = Vec::with_capacity(response.operators.len());
        for raw in &response.operators {
            match RemoteOperator::parse(raw) {
                Ok(operator) => parsed.push(operator),
                Err(e) => {
                    let source = raw
                        .get("uri")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("unknown");
                    tracing::warn!(source = %source, error = %e, "Skipping remote operator descriptor");
                    errors.push(InitializationError::new(source, e.to_string()));
                }
            }
        }

        self.remote.clear();
        let loaded = parsed.len();
        for operator in parsed {
            self.register_remote(operator);
        }

        tracing::info!(loaded, errors = errors.len(), "Remote operators loaded");
        *lock(&self.initialization_errors) = errors.clone();
        LoadReport { loaded, errors }
    }

    /// Failures collected by the last descriptor load
    pub fn initialization_errors(&self) -> Vec<InitializationError> {
        lock(&self.initialization_errors).clone()
    }

    // ── Combined view ────────────────────────────────────────────────

    /// Look up a raw URI, local first
    pub fn get_local_or_remote_operator(&self, raw: &str) -> Result<ResolvedOperator> {
        let uri = self.resolve_uri(raw)?;
        self.lookup(&uri)
            .ok_or_else(|| OperatorError::NotFound(uri.to_string()))
    }

    /// Look up a normalized URI, local first
    pub fn lookup(&self, uri: &OperatorUri) -> Option<ResolvedOperator> {
        self.get_operator(uri)
            .map(ResolvedOperator::Local)
            .or_else(|| self.get_remote_operator(uri).map(ResolvedOperator::Remote))
    }

    /// Every operator, local shadowing remote, ordered by URI
    pub fn list_operators(&self) -> Vec<ResolvedOperator> {
        let mut combined: BTreeMap<OperatorUri, ResolvedOperator> = self
            .remote
            .iter()
            .map(|entry| (entry.key().clone(), ResolvedOperator::Remote(entry.value().clone())))
            .collect();
        for entry in self.local.iter() {
            combined.insert(entry.key().clone(), ResolvedOperator::Local(entry.value().clone()));
        }
        combined.into_values().collect()
    }

    pub fn count(&self) -> usize {
        self.list_operators().len()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use async_trait::async_trait;
    use operator_types::OperatorConfig;
    use serde_json::{json, Value};

    struct Echo {
        uri: OperatorUri,
        config: OperatorConfig,
    }

    #[async_trait]
    impl Operator for Echo {
        fn uri(&self) -> &OperatorUri {
            &self.uri
        }

        fn config(&self) -> &OperatorConfig {
            &self.config
        }

        async fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<Value> {
            Ok(ctx.params.clone())
        }
    }

    fn echo(raw: &str) -> Arc<dyn Operator> {
        let uri = OperatorUri::parse(raw).unwrap();
        let config = OperatorConfig::new(uri.name());
        Arc::new(Echo { uri, config })
    }

    fn descriptor(uri: &str) -> Value {
        json!({ "uri": uri, "config": { "name": uri.rsplit('/').next().unwrap() } })
    }

    #[test]
    fn test_local_shadows_remote() {
        let registry = OperatorRegistry::new();
        registry.load_descriptors(ListOperatorsResponse {
            operators: vec![descriptor("@org/operators/echo")],
            errors: vec![],
        });
        assert!(registry.get_local_or_remote_operator("echo").unwrap().is_remote());

        registry.register(echo("echo"));
        for raw in ["echo", "@org/operators/echo", "@org/operators/echo#run"] {
            assert!(!registry.get_local_or_remote_operator(raw).unwrap().is_remote());
        }
        assert_eq!(registry.list_operators().len(), 1);
    }

    #[test]
    fn test_not_found() {
        let registry = OperatorRegistry::new();
        assert!(matches!(
            registry.get_local_or_remote_operator("missing"),
            Err(OperatorError::NotFound(uri)) if uri == "@org/operators/missing"
        ));
        assert!(matches!(
            registry.get_local_or_remote_operator(""),
            Err(OperatorError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_partial_load_keeps_good_descriptors() {
        let registry = OperatorRegistry::new();
        let report = registry.load_descriptors(ListOperatorsResponse {
            operators: vec![
                descriptor("@acme/tools/a"),
                json!({ "uri": "@acme/tools/broken" }),
                descriptor("@acme/tools/b"),
            ],
            errors: vec![json!({ "path": "@acme/legacy", "errors": ["import failed"] })],
        });

        assert_eq!(report.loaded, 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(registry.initialization_errors(), report.errors);
        assert!(registry.remote_operator_exists(&OperatorUri::parse("@acme/tools/a").unwrap()));
        assert!(!registry.remote_operator_exists(&OperatorUri::parse("@acme/tools/broken").unwrap()));
    }

    #[test]
    fn test_reload_replaces_remote_set() {
        let registry = OperatorRegistry::new();
        registry.load_descriptors(ListOperatorsResponse {
            operators: vec![descriptor("@acme/tools/a")],
            errors: vec![],
        });
        registry.load_descriptors(ListOperatorsResponse {
            operators: vec![descriptor("@acme/tools/b")],
            errors: vec![],
        });
        let uris: Vec<String> = registry
            .list_operators()
            .iter()
            .map(|op| op.uri().to_string())
            .collect();
        assert_eq!(uris, vec!["@acme/tools/b"]);
    }

    #[test]
    fn test_custom_namespace() {
        let registry = OperatorRegistry::with_namespace("@acme/tools");
        registry.register(echo("@acme/tools/echo"));
        assert!(registry.get_local_or_remote_operator("echo").is_ok());
    }
}
