//! Operator domain types
//!
//! Plain data shared by the operator runtime and its hosts:
//!
//! - [`OperatorUri`]: normalized `plugin/name` addresses
//! - [`OperatorConfig`]: per-operator metadata and behaviour flags
//! - [`Property`] / [`PropertyType`]: the structural schema tree, decoded
//!   through a flat tag table
//! - [`ValidationContext`]: result of checking params against a schema
//! - [`InvocationRequest`] / [`OperatorResult`]: what goes in and comes out
//! - [`ExecutionOptions`] / [`SubmitOptions`]: delegation policy and the
//!   choices derived from it
//! - [`wire`]: request/response shapes of the remote peer

#![deny(unsafe_code)]

pub mod config;
pub mod environment;
pub mod error;
pub mod invocation;
pub mod options;
pub mod result;
pub mod schema;
pub mod uri;
pub mod validation;
pub mod wire;

pub use config::{LifecycleEvent, OperatorConfig};
pub use environment::EnvironmentSnapshot;
pub use error::{OperatorError, Result};
pub use invocation::{normalize_params, ExecutorPayload, InvocationOptions, InvocationRequest};
pub use options::{ExecutionOptions, Orchestrator, SubmitOption, SubmitOptionKind, SubmitOptions};
pub use result::OperatorResult;
pub use schema::{ObjectType, Property, PropertyType, View};
pub use uri::{OperatorUri, DEFAULT_NAMESPACE};
pub use validation::{ValidationContext, ValidationError};
pub use wire::{GeneratorChunk, GeneratorMessage, InitializationError, OperatorDescriptor, SchemaTarget};
