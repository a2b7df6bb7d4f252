//! Host environment snapshot
//!
//! A read-only view of what the host has open when an invocation starts.
//! The core never interprets these values; it forwards them to operators
//! and to the remote peer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    /// Serialized view stages
    #[serde(default)]
    pub view: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_name: Option<String>,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub extended: bool,
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub selected_labels: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_sample: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_info: Option<Value>,
}

impl EnvironmentSnapshot {
    pub fn for_dataset(name: impl Into<String>) -> Self {
        Self {
            dataset_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_selection<I, S>(mut self, selected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = selected.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_current_sample(mut self, sample: impl Into<String>) -> Self {
        self.current_sample = Some(sample.into());
        self
    }
}
