//! Dispatcher
//!
//! Resolves an operator and runs it on one of three paths:
//!
//! - **local**: resolve and validate inputs, then call `execute()` with a
//!   live [`Executor`] attached to the context
//! - **remote**: one request/response call to the peer
//! - **streaming**: a generator call whose chunks arrive over one
//!   connection; triggers are queued as they arrive, the last result chunk
//!   becomes the outcome
//!
//! Execution errors (including panics inside local operators) are captured
//! in [`OperatorResult`], never returned as `Err`. Triggers accumulated by
//! the executor are queued once the invocation settles, whether it succeeded
//! or not: a request recorded before a failure has already been issued.

use crate::abort::AbortableOperationQueue;
use crate::context::ExecutionContext;
use crate::error::DispatchError;
use crate::executor::Executor;
use crate::host::{EnvironmentProvider, HookInjector, Notifier};
use crate::operator::{Operator, RemoteOperator, ResolvedOperator};
use crate::queue::InvocationRequestQueue;
use crate::registry::OperatorRegistry;
use crate::remote::RemoteClient;
use crate::schema::SchemaResolver;
use futures::{FutureExt, StreamExt};
use operator_types::wire::ExecuteResponse;
use operator_types::{
    GeneratorMessage, InvocationRequest, OperatorResult, OperatorUri, SubmitOption,
    ValidationContext,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::instrument;

/// Message reported when a remote operator is dispatched without a peer
const REMOTE_UNAVAILABLE: &str = "Remote operators are not configured";

pub struct Dispatcher {
    registry: Arc<OperatorRegistry>,
    queue: Arc<InvocationRequestQueue>,
    aborts: Arc<AbortableOperationQueue>,
    schemas: Arc<SchemaResolver>,
    remote: Option<Arc<dyn RemoteClient>>,
    environment: Arc<dyn EnvironmentProvider>,
    hooks: Arc<dyn HookInjector>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<OperatorRegistry>,
        queue: Arc<InvocationRequestQueue>,
        aborts: Arc<AbortableOperationQueue>,
        schemas: Arc<SchemaResolver>,
        remote: Option<Arc<dyn RemoteClient>>,
        environment: Arc<dyn EnvironmentProvider>,
        hooks: Arc<dyn HookInjector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            queue,
            aborts,
            schemas,
            remote,
            environment,
            hooks,
            notifier,
        }
    }

    /// Fresh context over the host's current environment
    pub fn context(&self, params: serde_json::Value) -> ExecutionContext {
        ExecutionContext::new(params, self.environment.snapshot())
    }

    /// Run a queued request against the host's current environment
    pub async fn execute_request(
        &self,
        request: &InvocationRequest,
    ) -> Result<OperatorResult, DispatchError> {
        let ctx = ExecutionContext::for_request(request, self.environment.snapshot());
        self.execute_operator_with_context(&request.operator_uri, ctx).await
    }

    /// Run the operator at `raw_uri` with `ctx`
    ///
    /// `Err` means nothing executed: the operator is unknown, its input
    /// schema could not be resolved, or its params are invalid.
    #[instrument(skip(self, ctx), fields(operator_uri = %raw_uri, depth = ctx.depth))]
    pub async fn execute_operator_with_context(
        &self,
        raw_uri: &str,
        ctx: ExecutionContext,
    ) -> Result<OperatorResult, DispatchError> {
        let operator = self
            .registry
            .get_local_or_remote_operator(raw_uri)
            .map_err(DispatchError::from_lookup)?;

        let ctx = if ctx.hooks().is_empty() {
            let hooks = self.hooks.hooks_for(operator.uri());
            ctx.with_hooks(hooks)
        } else {
            ctx
        };
        let depth = ctx.depth;

        let result = match &operator {
            ResolvedOperator::Local(local) => self.execute_local(&operator, local.as_ref(), ctx).await?,
            ResolvedOperator::Remote(remote) if remote.config.execute_as_generator => {
                self.execute_generator(remote, ctx).await
            }
            ResolvedOperator::Remote(remote) => self.execute_remote(remote, ctx).await,
        };

        if let Some(payload) = result.executor.clone() {
            Executor::hydrate(payload, depth).queue_requests(&self.queue);
        }

        if let Some(message) = result.error_text() {
            tracing::warn!(error = %message, "Operator execution failed");
            self.notifier.notify_error(&result.operator_uri, message);
        } else {
            tracing::debug!(delegated = result.delegated, "Operator execution finished");
        }

        Ok(result)
    }

    /// Run with the delegation choice of a submit option
    pub async fn execute_with_submit_option(
        &self,
        raw_uri: &str,
        ctx: ExecutionContext,
        option: &SubmitOption,
    ) -> Result<OperatorResult, DispatchError> {
        if option.disabled {
            return Err(DispatchError::SubmitOptionDisabled(option.id.clone()));
        }
        let (request_delegation, delegation_target) = option.delegation();
        let mut ctx = ctx;
        ctx.options.request_delegation = request_delegation;
        ctx.options.delegation_target = delegation_target;
        self.execute_operator_with_context(raw_uri, ctx).await
    }

    /// Cancel every in-flight stream for `raw_uri`
    pub fn abort_by_uri(&self, raw_uri: &str) -> Result<usize, DispatchError> {
        let uri = self
            .registry
            .resolve_uri(raw_uri)
            .map_err(|_| DispatchError::InvalidUri(raw_uri.to_string()))?;
        Ok(self.aborts.abort_by_uri(&uri))
    }

    pub fn schemas(&self) -> &SchemaResolver {
        &self.schemas
    }

    // ── Local ────────────────────────────────────────────────────────

    async fn execute_local(
        &self,
        resolved: &ResolvedOperator,
        operator: &dyn Operator,
        ctx: ExecutionContext,
    ) -> Result<OperatorResult, DispatchError> {
        let uri = operator.uri().clone();

        if let Some(inputs) = self.schemas.resolve_input(resolved, &ctx).await? {
            let validation = ValidationContext::validate(
                &ctx.params,
                &inputs,
                operator.config().disable_schema_validation,
            );
            if validation.invalid {
                tracing::info!(errors = validation.errors.len(), "Inputs failed validation");
                return Err(DispatchError::InvalidInputs { uri, validation });
            }
        }

        let executor = Executor::at_depth(ctx.depth);
        let ctx = ctx.with_executor(executor.clone());
        let outcome = AssertUnwindSafe(operator.execute(&ctx)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(value)) => OperatorResult::success(uri.clone(), Some(value)),
            Ok(Err(e)) => OperatorResult::failure(uri.clone(), e.to_string())
                .with_error_message(Some(format!("{:#}", e))),
            Err(panic) => OperatorResult::failure(uri.clone(), panic_message(panic.as_ref())),
        };

        let payload = executor.to_payload();
        let has_effects = !payload.requests.is_empty() || !payload.logs.is_empty();
        Ok(result.with_executor(Some(payload).filter(|_| has_effects)))
    }

    // ── Remote ───────────────────────────────────────────────────────

    async fn execute_remote(&self, operator: &RemoteOperator, ctx: ExecutionContext) -> OperatorResult {
        let uri = operator.uri.clone();
        let Some(client) = self.remote.as_ref() else {
            return OperatorResult::failure(uri, REMOTE_UNAVAILABLE);
        };

        let request = ctx.to_execute_request(&uri, None);
        match client.execute(&request).await {
            Ok(response) => from_response(uri, response),
            Err(e) => OperatorResult::failure(uri, e.to_string()),
        }
    }

    async fn execute_generator(
        &self,
        operator: &RemoteOperator,
        ctx: ExecutionContext,
    ) -> OperatorResult {
        let uri = operator.uri.clone();
        let Some(client) = self.remote.as_ref() else {
            return OperatorResult::failure(uri, REMOTE_UNAVAILABLE);
        };

        let registration = self.aborts.add(uri.clone(), ctx.params.clone());
        let mut signal = registration.signal();
        let request = ctx.to_execute_request(&uri, None);

        let opened = tokio::select! {
            biased;
            _ = signal.aborted() => None,
            opened = client.execute_generator(&request) => Some(opened),
        };
        let mut stream = match opened {
            None => return aborted(uri),
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return OperatorResult::failure(uri, e.to_string()),
        };

        let child_depth = ctx.depth.saturating_add(1);
        let mut last_response: Option<ExecuteResponse> = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = signal.aborted() => return aborted(uri),
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) if registration.is_aborted() => {
                    tracing::debug!(error = %e, "Stream error after abort");
                    return aborted(uri);
                }
                Some(Err(e)) => return OperatorResult::failure(uri, e.to_string()),
                Some(Ok(chunk)) => match chunk.decode() {
                    Ok(GeneratorMessage::Trigger(mut request)) => {
                        request.depth = request.depth.max(child_depth);
                        self.queue.add(request);
                    }
                    Ok(GeneratorMessage::Result(response)) => last_response = Some(response),
                    Ok(GeneratorMessage::Ignored(chunk_type)) => {
                        tracing::debug!(chunk_type = ?chunk_type, "Ignoring generator chunk");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed generator chunk");
                    }
                },
            }
        }

        drop(registration);
        match last_response {
            Some(response) => from_response(uri, response),
            None => OperatorResult::success(uri, None),
        }
    }
}

fn from_response(uri: OperatorUri, response: ExecuteResponse) -> OperatorResult {
    OperatorResult {
        operator_uri: uri,
        result: response.result,
        executor: response.executor,
        error: response.error,
        error_message: response.error_message,
        delegated: response.delegated,
    }
}

/// An explicitly cancelled stream is not a failure
fn aborted(uri: OperatorUri) -> OperatorResult {
    tracing::info!(operator_uri = %uri, "Streaming execution aborted");
    OperatorResult::success(uri, None)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("operator panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("operator panicked: {}", message)
    } else {
        "operator panicked".to_string()
    }
}
