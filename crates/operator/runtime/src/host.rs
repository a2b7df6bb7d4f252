//! Host collaborators
//!
//! The runtime reads the host's state through [`EnvironmentProvider`],
//! hands operators host capabilities through [`HookInjector`], and reports
//! user-facing failures through [`Notifier`].

use operator_types::{EnvironmentSnapshot, OperatorUri};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Supplies the environment snapshot for each new invocation
pub trait EnvironmentProvider: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Fixed environment, replaceable by the host
#[derive(Default)]
pub struct StaticEnvironment {
    snapshot: RwLock<EnvironmentSnapshot>,
}

impl StaticEnvironment {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: EnvironmentSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl EnvironmentProvider for StaticEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// A host capability callable from `execute()`
pub type Hook = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Named capability hooks available to one invocation
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: HashMap<String, Hook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, hook: Hook) -> Self {
        self.hooks.insert(name.into(), hook);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Call a hook by name
    pub fn call(&self, name: &str, args: Value) -> anyhow::Result<Value> {
        let hook = self
            .hooks
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("hook \"{}\" is not available", name))?;
        hook(args)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Hooks").field("names", &names).finish()
    }
}

/// Provides the hooks a given operator may use
pub trait HookInjector: Send + Sync {
    fn hooks_for(&self, uri: &OperatorUri) -> Hooks;
}

/// Gives every operator the same hooks
#[derive(Clone, Default)]
pub struct SharedHooks(pub Hooks);

impl HookInjector for SharedHooks {
    fn hooks_for(&self, _uri: &OperatorUri) -> Hooks {
        self.0.clone()
    }
}

/// Sink for user-facing error messages
pub trait Notifier: Send + Sync {
    fn notify_error(&self, uri: &OperatorUri, message: &str);
}

/// Writes notifications to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, uri: &OperatorUri, message: &str) {
        tracing::error!(operator_uri = %uri, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hooks_call() {
        let hooks = Hooks::new().with(
            "set_selection",
            Arc::new(|args: Value| Ok(json!({ "selected": args }))),
        );
        assert!(hooks.contains("set_selection"));
        let out = hooks.call("set_selection", json!(["a"])).unwrap();
        assert_eq!(out, json!({ "selected": ["a"] }));
        assert!(hooks.call("reload", Value::Null).is_err());
    }

    #[test]
    fn test_static_environment_replace() {
        let env = StaticEnvironment::default();
        assert!(env.snapshot().dataset_name.is_none());
        env.set(EnvironmentSnapshot::for_dataset("quickstart"));
        assert_eq!(env.snapshot().dataset_name.as_deref(), Some("quickstart"));
    }
}
