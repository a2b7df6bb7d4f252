//! Operator metadata and behaviour flags

use serde::{Deserialize, Serialize};

/// Lifecycle events an operator may opt into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Fired once when the host starts
    Startup,
    /// Fired each time a dataset is opened
    DatasetOpen,
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleEvent::Startup => write!(f, "on_startup"),
            LifecycleEvent::DatasetOpen => write!(f, "on_dataset_open"),
        }
    }
}

/// Static configuration of an operator
///
/// Constructed once per operator and never mutated afterwards. Remote
/// descriptors decode into this struct directly, so every flag has a
/// serde default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Operator name (last URI segment)
    pub name: String,
    /// Human readable label
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inputs/outputs must be resolved per invocation
    #[serde(default)]
    pub dynamic: bool,
    /// Executes remotely as a streamed generator
    #[serde(default)]
    pub execute_as_generator: bool,
    /// Hidden from operator listings shown to users
    #[serde(default)]
    pub unlisted: bool,
    #[serde(default)]
    pub on_startup: bool,
    #[serde(default)]
    pub on_dataset_open: bool,
    /// Whether lifecycle sweeps may invoke the operator
    #[serde(default = "default_true")]
    pub can_execute: bool,
    /// Suppresses structural validation errors (custom invalidity still applies)
    #[serde(default)]
    pub disable_schema_validation: bool,
    /// Re-resolve execution options whenever params change
    #[serde(default)]
    pub resolve_execution_options_on_change: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

fn default_true() -> bool {
    true
}

impl OperatorConfig {
    /// Create a config with defaults; the label starts as the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            description: None,
            dynamic: false,
            execute_as_generator: false,
            unlisted: false,
            on_startup: false,
            on_dataset_open: false,
            can_execute: true,
            disable_schema_validation: false,
            resolve_execution_options_on_change: false,
            icon: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn as_generator(mut self) -> Self {
        self.execute_as_generator = true;
        self
    }

    pub fn unlisted(mut self) -> Self {
        self.unlisted = true;
        self
    }

    /// Opt into a lifecycle event
    pub fn on(mut self, event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Startup => self.on_startup = true,
            LifecycleEvent::DatasetOpen => self.on_dataset_open = true,
        }
        self
    }

    pub fn with_can_execute(mut self, can_execute: bool) -> Self {
        self.can_execute = can_execute;
        self
    }

    pub fn without_schema_validation(mut self) -> Self {
        self.disable_schema_validation = true;
        self
    }

    /// Whether the operator subscribed to `event`
    pub fn listens_to(&self, event: LifecycleEvent) -> bool {
        match event {
            LifecycleEvent::Startup => self.on_startup,
            LifecycleEvent::DatasetOpen => self.on_dataset_open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OperatorConfig::new("noop");
        assert_eq!(config.label, "noop");
        assert!(config.can_execute);
        assert!(!config.dynamic);
        assert!(!config.listens_to(LifecycleEvent::Startup));
    }

    #[test]
    fn test_decode_sparse_descriptor() {
        let config: OperatorConfig = serde_json::from_value(serde_json::json!({
            "name": "export",
            "execute_as_generator": true,
            "on_dataset_open": true,
        }))
        .unwrap();
        assert!(config.execute_as_generator);
        assert!(config.can_execute);
        assert!(config.listens_to(LifecycleEvent::DatasetOpen));
        assert!(!config.listens_to(LifecycleEvent::Startup));
    }

    #[test]
    fn test_builder_flags() {
        let config = OperatorConfig::new("refresh")
            .with_label("Refresh")
            .dynamic()
            .on(LifecycleEvent::Startup)
            .without_schema_validation();
        assert_eq!(config.label, "Refresh");
        assert!(config.dynamic);
        assert!(config.on_startup);
        assert!(config.disable_schema_validation);
    }
}
