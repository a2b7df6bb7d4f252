//! Execution options and delegation
//!
//! Remote operators ask the peer whether they may run now, be delegated,
//! or both; local operators only ever run immediately. The resolved policy
//! is turned into [`SubmitOptions`] for the caller to choose from.
//!
//! While params are being edited, [`ExecutionOptionsWatcher`] re-resolves
//! through a [`Debouncer`] and publishes the latest state on a watch channel.

use crate::context::ExecutionContext;
use crate::debounce::{DebouncedAction, Debouncer};
use crate::error::{Result, RuntimeError};
use crate::operator::ResolvedOperator;
use crate::registry::OperatorRegistry;
use crate::remote::RemoteClient;
use futures::FutureExt;
use operator_types::{ExecutionOptions, SubmitOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct ExecutionOptionsResolver {
    registry: Arc<OperatorRegistry>,
    remote: Option<Arc<dyn RemoteClient>>,
}

impl ExecutionOptionsResolver {
    pub fn new(registry: Arc<OperatorRegistry>, remote: Option<Arc<dyn RemoteClient>>) -> Self {
        Self { registry, remote }
    }

    /// Delegation policy for invoking `raw_uri` with `ctx`
    pub async fn resolve(&self, raw_uri: &str, ctx: &ExecutionContext) -> Result<ExecutionOptions> {
        let operator = self.registry.get_local_or_remote_operator(raw_uri)?;
        match operator {
            ResolvedOperator::Local(_) => Ok(ExecutionOptions::immediate_only()),
            ResolvedOperator::Remote(remote) => {
                let client = self.remote.as_ref().ok_or(RuntimeError::RemoteUnavailable)?;
                let request = ctx.to_execute_request(&remote.uri, None);
                let options = client.resolve_execution_options(&request).await?;
                tracing::debug!(
                    operator_uri = %remote.uri,
                    immediate = options.allow_immediate_execution,
                    delegated = options.allow_delegated_execution,
                    orchestrators = options.available_orchestrators.len(),
                    "Execution options resolved"
                );
                Ok(options)
            }
        }
    }

    /// Resolve and derive the submit choices
    pub async fn submit_options(&self, raw_uri: &str, ctx: &ExecutionContext) -> Result<ResolvedExecutionOptions> {
        let options = self.resolve(raw_uri, ctx).await?;
        Ok(ResolvedExecutionOptions::from(options))
    }
}

/// A resolved policy together with the choices derived from it
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedExecutionOptions {
    pub options: ExecutionOptions,
    pub submit: SubmitOptions,
}

impl From<ExecutionOptions> for ResolvedExecutionOptions {
    fn from(options: ExecutionOptions) -> Self {
        let submit = SubmitOptions::from_options(&options);
        Self { options, submit }
    }
}

/// Latest state published by an [`ExecutionOptionsWatcher`]
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionOptionsState {
    /// Nothing resolved yet
    Pending,
    Ready(ResolvedExecutionOptions),
    Failed(String),
}

/// Debounced execution-option resolution for one operator
pub struct ExecutionOptionsWatcher {
    debouncer: Debouncer<ExecutionContext>,
    state: watch::Receiver<ExecutionOptionsState>,
}

impl ExecutionOptionsWatcher {
    /// Fails when called outside a tokio runtime
    pub fn new(
        resolver: Arc<ExecutionOptionsResolver>,
        raw_uri: impl Into<String>,
        window: Duration,
    ) -> Result<Self> {
        let raw_uri: Arc<str> = Arc::from(raw_uri.into());
        let (tx, state) = watch::channel(ExecutionOptionsState::Pending);
        let tx = Arc::new(tx);

        let action: DebouncedAction<ExecutionContext> = Arc::new(move |ctx: ExecutionContext| {
            let resolver = resolver.clone();
            let raw_uri = raw_uri.clone();
            let tx = tx.clone();
            async move {
                let next = match resolver.submit_options(&raw_uri, &ctx).await {
                    Ok(resolved) => ExecutionOptionsState::Ready(resolved),
                    Err(e) => {
                        tracing::warn!(operator_uri = %raw_uri, error = %e, "Execution options unavailable");
                        ExecutionOptionsState::Failed(e.to_string())
                    }
                };
                tx.send_replace(next);
            }
            .boxed()
        });

        Ok(Self {
            debouncer: Debouncer::new(window, action)?,
            state,
        })
    }

    /// Params changed; schedule a re-resolution
    pub fn params_changed(&self, ctx: ExecutionContext) {
        self.debouncer.call(ctx);
    }

    pub fn current(&self) -> ExecutionOptionsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionOptionsState> {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use operator_types::wire::ListOperatorsResponse;
    use operator_types::EnvironmentSnapshot;
    use serde_json::json;

    fn registry_with_remote() -> Arc<OperatorRegistry> {
        let registry = Arc::new(OperatorRegistry::new());
        registry.load_descriptors(ListOperatorsResponse {
            operators: vec![json!({ "uri": "@acme/tools/export", "config": { "name": "export" } })],
            errors: vec![],
        });
        registry
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(json!({}), EnvironmentSnapshot::default())
    }

    #[tokio::test]
    async fn test_remote_without_peer() {
        let resolver = ExecutionOptionsResolver::new(registry_with_remote(), None);
        assert!(matches!(
            resolver.resolve("@acme/tools/export", &ctx()).await,
            Err(RuntimeError::RemoteUnavailable)
        ));
        assert!(matches!(
            resolver.resolve("missing", &ctx()).await,
            Err(RuntimeError::Operator(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_publishes_failure() {
        let resolver = Arc::new(ExecutionOptionsResolver::new(registry_with_remote(), None));
        let watcher =
            ExecutionOptionsWatcher::new(resolver, "@acme/tools/export", Duration::from_millis(50)).unwrap();
        assert_eq!(watcher.current(), ExecutionOptionsState::Pending);

        let mut updates = watcher.subscribe();
        watcher.params_changed(ctx());
        updates.changed().await.unwrap();
        assert!(matches!(watcher.current(), ExecutionOptionsState::Failed(_)));
    }

    #[test]
    fn test_watcher_needs_a_runtime() {
        let resolver = Arc::new(ExecutionOptionsResolver::new(registry_with_remote(), None));
        assert!(matches!(
            ExecutionOptionsWatcher::new(resolver, "@acme/tools/export", Duration::from_millis(50)),
            Err(RuntimeError::NoAsyncRuntime(_))
        ));
    }
}
