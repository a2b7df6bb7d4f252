//! Operator runtime facade
//!
//! [`OperatorRuntime`] owns the registry, invocation queue, abort queue,
//! dispatcher and option resolver, and is the entry point hosts talk to.
//! Build one with [`OperatorRuntime::builder`].

use crate::abort::AbortableOperationQueue;
use crate::builder::OperatorRuntimeBuilder;
use crate::config::RuntimeConfig;
use crate::context::ExecutionContext;
use crate::dispatcher::Dispatcher;
use crate::drain::{DrainerHandle, QueueDrainer};
use crate::error::{DispatchError, Result, RuntimeError};
use crate::execution_options::{
    ExecutionOptionsResolver, ExecutionOptionsWatcher, ResolvedExecutionOptions,
};
use crate::host::EnvironmentProvider;
use crate::lifecycle;
use crate::observer::lock;
use crate::operator::{Operator, ResolvedOperator};
use crate::queue::{InvocationRequestQueue, QueueItemId};
use crate::registry::{LoadReport, OperatorRegistry};
use crate::remote::RemoteClient;
use crate::schema::{InputPrompt, SchemaResolver};
use operator_types::wire::{ListOperatorsRequest, Placement};
use operator_types::{
    ExecutionOptions, InitializationError, InvocationRequest, LifecycleEvent, OperatorResult,
    Property, SubmitOption,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::instrument;

pub struct OperatorRuntime {
    config: RuntimeConfig,
    registry: Arc<OperatorRegistry>,
    queue: Arc<InvocationRequestQueue>,
    aborts: Arc<AbortableOperationQueue>,
    schemas: Arc<SchemaResolver>,
    dispatcher: Arc<Dispatcher>,
    options: Arc<ExecutionOptionsResolver>,
    drainer: Arc<QueueDrainer>,
    remote: Option<Arc<dyn RemoteClient>>,
    environment: Arc<dyn EnvironmentProvider>,
    drainer_handle: Mutex<Option<DrainerHandle>>,
}

impl OperatorRuntime {
    pub fn builder() -> OperatorRuntimeBuilder {
        OperatorRuntimeBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: RuntimeConfig,
        registry: Arc<OperatorRegistry>,
        queue: Arc<InvocationRequestQueue>,
        aborts: Arc<AbortableOperationQueue>,
        schemas: Arc<SchemaResolver>,
        dispatcher: Arc<Dispatcher>,
        options: Arc<ExecutionOptionsResolver>,
        remote: Option<Arc<dyn RemoteClient>>,
        environment: Arc<dyn EnvironmentProvider>,
    ) -> Self {
        let drainer = Arc::new(QueueDrainer::new(
            dispatcher.clone(),
            queue.clone(),
            config.dispatch.max_trigger_depth,
        ));
        Self {
            config,
            registry,
            queue,
            aborts,
            schemas,
            dispatcher,
            options,
            drainer,
            remote,
            environment,
            drainer_handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<InvocationRequestQueue> {
        &self.queue
    }

    pub fn aborts(&self) -> &Arc<AbortableOperationQueue> {
        &self.aborts
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Fresh context over the host's current environment
    pub fn context(&self, params: Value) -> ExecutionContext {
        ExecutionContext::new(params, self.environment.snapshot())
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Register a local operator, replacing any previous one at its URI
    pub fn register(&self, operator: Arc<dyn Operator>) {
        self.schemas.forget(operator.uri());
        self.registry.register(operator);
    }

    pub fn unregister(&self, raw_uri: &str) -> Option<Arc<dyn Operator>> {
        let uri = self.registry.resolve_uri(raw_uri).ok()?;
        self.schemas.forget(&uri);
        self.registry.unregister(&uri)
    }

    /// Fetch remote descriptors and replace the remote registry
    #[instrument(skip(self))]
    pub async fn load_remote_operators(&self) -> Result<LoadReport> {
        let client = self.remote.as_ref().ok_or(RuntimeError::RemoteUnavailable)?;
        let request = ListOperatorsRequest {
            environment: self.environment.snapshot(),
        };
        let response = client.list_operators(&request).await?;
        let report = self.registry.load_descriptors(response);
        self.schemas.clear_cache();
        Ok(report)
    }

    pub fn list_operators(&self) -> Vec<ResolvedOperator> {
        self.registry.list_operators()
    }

    pub fn initialization_errors(&self) -> Vec<InitializationError> {
        self.registry.initialization_errors()
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Queue an invocation; a running drainer picks it up
    pub fn execute_operator(&self, raw_uri: &str, params: Value) -> QueueItemId {
        self.queue.add(InvocationRequest::new(raw_uri, params))
    }

    /// Run an operator now and wait for its result
    pub async fn execute_operator_with_context(
        &self,
        raw_uri: &str,
        ctx: ExecutionContext,
    ) -> std::result::Result<OperatorResult, DispatchError> {
        self.dispatcher.execute_operator_with_context(raw_uri, ctx).await
    }

    /// Run an operator now with the delegation choice of `option`
    pub async fn execute_with_submit_option(
        &self,
        raw_uri: &str,
        ctx: ExecutionContext,
        option: &SubmitOption,
    ) -> std::result::Result<OperatorResult, DispatchError> {
        self.dispatcher.execute_with_submit_option(raw_uri, ctx, option).await
    }

    /// Cancel every in-flight stream of an operator
    pub fn abort_by_uri(&self, raw_uri: &str) -> std::result::Result<usize, DispatchError> {
        self.dispatcher.abort_by_uri(raw_uri)
    }

    /// Queue every operator listening to `event`
    pub fn execute_operators_for_event(&self, event: LifecycleEvent) -> Vec<QueueItemId> {
        lifecycle::execute_operators_for_event(&self.registry, &self.queue, event)
    }

    // ── Queue draining ───────────────────────────────────────────────

    /// Start draining the queue in the background; a no-op if already running
    pub fn start_draining(&self) {
        let mut handle = lock(&self.drainer_handle);
        if handle.is_none() {
            *handle = Some(self.drainer.clone().start());
        }
    }

    pub async fn stop_draining(&self) {
        let handle = lock(&self.drainer_handle).take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    /// Run pending items and everything they trigger; returns how many ran
    pub async fn drain_until_idle(&self) -> usize {
        self.drainer.drain_until_idle().await
    }

    // ── Schemas ──────────────────────────────────────────────────────

    pub async fn resolve_input_prompt(
        &self,
        raw_uri: &str,
        ctx: &ExecutionContext,
    ) -> std::result::Result<InputPrompt, DispatchError> {
        let operator = self
            .registry
            .get_local_or_remote_operator(raw_uri)
            .map_err(DispatchError::from_lookup)?;
        Ok(self.schemas.resolve_input_prompt(&operator, ctx).await)
    }

    pub async fn resolve_output(
        &self,
        raw_uri: &str,
        ctx: &ExecutionContext,
    ) -> std::result::Result<Option<Property>, DispatchError> {
        let operator = self
            .registry
            .get_local_or_remote_operator(raw_uri)
            .map_err(DispatchError::from_lookup)?;
        self.schemas.resolve_output(&operator, ctx).await
    }

    // ── Delegation ───────────────────────────────────────────────────

    pub async fn resolve_execution_options(
        &self,
        raw_uri: &str,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionOptions> {
        self.options.resolve(raw_uri, ctx).await
    }

    pub async fn submit_options(
        &self,
        raw_uri: &str,
        ctx: &ExecutionContext,
    ) -> Result<ResolvedExecutionOptions> {
        self.options.submit_options(raw_uri, ctx).await
    }

    /// Debounced option resolution for a form editing `raw_uri`'s params
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch_execution_options(&self, raw_uri: &str) -> Result<ExecutionOptionsWatcher> {
        ExecutionOptionsWatcher::new(
            self.options.clone(),
            raw_uri,
            self.config.execution_options.debounce(),
        )
    }

    // ── Placements ───────────────────────────────────────────────────

    /// Where the host should surface remote operators
    pub async fn resolve_placements(&self) -> Result<Vec<Placement>> {
        let Some(client) = self.remote.as_ref() else {
            tracing::debug!("No remote peer; no placements");
            return Ok(Vec::new());
        };
        let request = ListOperatorsRequest {
            environment: self.environment.snapshot(),
        };
        Ok(client.resolve_placements(&request).await?.placements)
    }
}
