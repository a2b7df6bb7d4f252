//! Execution context
//!
//! One invocation's params, the host environment snapshot, its capability
//! hooks and, only while a local operator is running, the live
//! [`Executor`] that collects its triggers and logs.

use crate::executor::Executor;
use crate::host::Hooks;
use operator_types::wire::{ExecuteRequest, SchemaTarget};
use operator_types::{
    normalize_params, EnvironmentSnapshot, InvocationOptions, InvocationRequest, OperatorError,
    OperatorUri, Result,
};
use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    pub params: Value,
    pub environment: EnvironmentSnapshot,
    /// Delegation flags forwarded to the remote peer
    pub options: InvocationOptions,
    /// Trigger depth of this invocation
    pub depth: u32,
    hooks: Hooks,
    executor: Option<Executor>,
}

impl ExecutionContext {
    pub fn new(params: Value, environment: EnvironmentSnapshot) -> Self {
        Self {
            params: normalize_params(params),
            environment,
            ..Self::default()
        }
    }

    /// Context for a queued request
    pub fn for_request(request: &InvocationRequest, environment: EnvironmentSnapshot) -> Self {
        Self {
            options: request.options.clone(),
            depth: request.depth,
            ..Self::new(request.params.clone(), environment)
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_options(mut self, options: InvocationOptions) -> Self {
        self.options = options;
        self
    }

    /// Ask the peer to delegate, optionally to a specific orchestrator
    pub fn with_delegation(mut self, delegation_target: Option<String>) -> Self {
        self.options.request_delegation = true;
        self.options.delegation_target = delegation_target;
        self
    }

    pub(crate) fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn executor(&self) -> Option<&Executor> {
        self.executor.as_ref()
    }

    /// A single param by name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Queue another operator to run after this one finishes
    pub fn trigger(&self, operator_uri: impl Into<String>, params: Value) -> Result<()> {
        let executor = self
            .executor
            .as_ref()
            .ok_or(OperatorError::NoActiveExecutor("trigger"))?;
        executor.trigger(operator_uri, params);
        Ok(())
    }

    pub fn log(&self, message: impl Into<String>) -> Result<()> {
        let executor = self
            .executor
            .as_ref()
            .ok_or(OperatorError::NoActiveExecutor("log"))?;
        executor.log(message);
        Ok(())
    }

    /// Body sent to the peer for `uri`
    pub fn to_execute_request(&self, uri: &OperatorUri, target: Option<SchemaTarget>) -> ExecuteRequest {
        ExecuteRequest {
            operator_uri: uri.to_string(),
            params: self.params.clone(),
            environment: self.environment.clone(),
            request_delegation: self.options.request_delegation,
            delegation_target: self.options.delegation_target.clone(),
            target,
        }
    }
}
