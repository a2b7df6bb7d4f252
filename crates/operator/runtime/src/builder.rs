//! Builder for OperatorRuntime
//!
//! Every collaborator is optional. Without an explicit remote client one is
//! created from `remote.base_url`; without one of those, remote operators
//! are disabled.

use crate::abort::AbortableOperationQueue;
use crate::config::RuntimeConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::execution_options::ExecutionOptionsResolver;
use crate::host::{
    EnvironmentProvider, HookInjector, Notifier, SharedHooks, StaticEnvironment, TracingNotifier,
};
use crate::queue::InvocationRequestQueue;
use crate::registry::OperatorRegistry;
use crate::remote::{HttpRemoteClient, RemoteClient};
use crate::runtime::OperatorRuntime;
use crate::schema::SchemaResolver;
use std::sync::Arc;

#[derive(Default)]
pub struct OperatorRuntimeBuilder {
    config: RuntimeConfig,
    remote: Option<Arc<dyn RemoteClient>>,
    environment: Option<Arc<dyn EnvironmentProvider>>,
    hooks: Option<Arc<dyn HookInjector>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl OperatorRuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this client instead of one built from the config
    pub fn with_remote_client(mut self, client: Arc<dyn RemoteClient>) -> Self {
        self.remote = Some(client);
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn EnvironmentProvider>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_hook_injector(mut self, hooks: Arc<dyn HookInjector>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the runtime with all components
    pub fn build(self) -> Result<OperatorRuntime> {
        let remote = match (self.remote, &self.config.remote.base_url) {
            (Some(client), _) => Some(client),
            (None, Some(base_url)) => {
                let client = HttpRemoteClient::new(base_url, self.config.remote.timeout())?;
                tracing::info!(base_url = %client.base_url(), "Remote operator peer configured");
                Some(Arc::new(client) as Arc<dyn RemoteClient>)
            }
            (None, None) => None,
        };

        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(StaticEnvironment::default()));
        let hooks = self.hooks.unwrap_or_else(|| Arc::new(SharedHooks::default()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        let registry = Arc::new(OperatorRegistry::with_namespace(
            self.config.dispatch.default_namespace.clone(),
        ));
        let queue = Arc::new(InvocationRequestQueue::new());
        let aborts = Arc::new(AbortableOperationQueue::new());
        let schemas = Arc::new(SchemaResolver::new(remote.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            queue.clone(),
            aborts.clone(),
            schemas.clone(),
            remote.clone(),
            environment.clone(),
            hooks,
            notifier,
        ));
        let options = Arc::new(ExecutionOptionsResolver::new(registry.clone(), remote.clone()));

        Ok(OperatorRuntime::new(
            self.config,
            registry,
            queue,
            aborts,
            schemas,
            dispatcher,
            options,
            remote,
            environment,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;

    #[test]
    fn test_build_defaults() {
        let runtime = OperatorRuntimeBuilder::new().build().unwrap();
        assert_eq!(runtime.registry().namespace(), operator_types::DEFAULT_NAMESPACE);
        assert!(runtime.queue().is_empty());
    }

    #[test]
    fn test_build_with_remote_url_and_namespace() {
        let mut config = RuntimeConfig::default();
        config.remote = RemoteConfig {
            base_url: Some("http://localhost:5151".into()),
            timeout_secs: 5,
        };
        config.dispatch.default_namespace = "@acme/tools".into();

        let runtime = OperatorRuntimeBuilder::new().with_config(config).build().unwrap();
        assert_eq!(runtime.registry().namespace(), "@acme/tools");
        assert_eq!(runtime.config().remote.timeout_secs, 5);
    }
}
