//! Operator invocation runtime
//!
//! Registers operators, resolves and validates their inputs, dispatches
//! them in-process or to a remote peer, and propagates the invocations they
//! trigger through a concurrently drained queue.
//!
//! # Architecture
//!
//! [`OperatorRuntime`] composes the services:
//!
//! - [`OperatorRegistry`]: local and remote operators; local shadows remote
//! - [`SchemaResolver`]: static and dynamic input/output schemas
//! - [`Dispatcher`]: local, remote and streaming execution paths
//! - [`InvocationRequestQueue`]: fan-out worklist of triggered invocations
//! - [`QueueDrainer`]: runs each pending item on its own task
//! - [`AbortableOperationQueue`]: cancellation of streaming invocations
//! - [`ExecutionOptionsResolver`]: immediate vs delegated execution
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use operator_runtime::{ExecutionContext, Operator, OperatorRuntime};
//! use operator_types::{OperatorConfig, OperatorUri};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct Refresh {
//!     uri: OperatorUri,
//!     config: OperatorConfig,
//! }
//!
//! #[async_trait]
//! impl Operator for Refresh {
//!     fn uri(&self) -> &OperatorUri {
//!         &self.uri
//!     }
//!
//!     fn config(&self) -> &OperatorConfig {
//!         &self.config
//!     }
//!
//!     async fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<Value> {
//!         ctx.log("refreshing")?;
//!         Ok(json!({}))
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = OperatorRuntime::builder().build()?;
//! runtime.register(Arc::new(Refresh {
//!     uri: OperatorUri::parse("refresh")?,
//!     config: OperatorConfig::new("refresh"),
//! }));
//!
//! runtime.execute_operator("refresh", Value::Null);
//! runtime.drain_until_idle().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]

pub mod abort;
pub mod builder;
pub mod config;
pub mod context;
pub mod debounce;
pub mod dispatcher;
pub mod drain;
pub mod error;
pub mod execution_options;
pub mod executor;
pub mod host;
pub mod lifecycle;
pub mod observer;
pub mod operator;
pub mod queue;
pub mod registry;
pub mod remote;
pub mod runtime;
pub mod schema;
pub mod telemetry;

pub use abort::{AbortRegistration, AbortSignal, AbortableOperationQueue};
pub use builder::OperatorRuntimeBuilder;
pub use config::RuntimeConfig;
pub use context::ExecutionContext;
pub use debounce::Debouncer;
pub use dispatcher::Dispatcher;
pub use drain::{DrainerHandle, QueueDrainer};
pub use error::{DispatchError, Result, RuntimeError};
pub use execution_options::{
    ExecutionOptionsResolver, ExecutionOptionsState, ExecutionOptionsWatcher,
    ResolvedExecutionOptions,
};
pub use executor::Executor;
pub use host::{EnvironmentProvider, HookInjector, Hooks, Notifier, StaticEnvironment};
pub use operator::{Operator, RemoteOperator, ResolvedOperator};
pub use queue::{InvocationRequestQueue, QueueItem, QueueItemId, QueueItemStatus, QueueSnapshot};
pub use registry::{LoadReport, OperatorRegistry};
pub use remote::{HttpRemoteClient, RemoteClient};
pub use runtime::OperatorRuntime;
pub use schema::{InputPrompt, SchemaResolver};
pub use telemetry::init_tracing;
