//! Execution options and the submit choices derived from them
//!
//! The peer decides whether an invocation may run now, be delegated, or
//! both, and which orchestrators are registered. [`SubmitOptions::from_options`]
//! turns that policy into the ordered list of choices offered to a caller.

use serde::{Deserialize, Serialize};

/// An external execution target registered with the peer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orchestrator {
    #[serde(alias = "_id")]
    pub id: String,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub available_operators: Vec<String>,
}

/// Delegation policy for one pending invocation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    #[serde(default)]
    pub allow_immediate_execution: bool,
    #[serde(default)]
    pub allow_delegated_execution: bool,
    #[serde(default)]
    pub orchestrator_registration_enabled: bool,
    #[serde(default)]
    pub available_orchestrators: Vec<Orchestrator>,
    #[serde(default)]
    pub default_choice_to_delegated: bool,
}

impl ExecutionOptions {
    /// Local operators can only run in-process, right now
    pub fn immediate_only() -> Self {
        Self {
            allow_immediate_execution: true,
            ..Self::default()
        }
    }
}

/// What selecting an option does
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitOptionKind {
    /// Execute immediately
    Execute,
    /// Delegate to whichever orchestrator the peer picks
    Schedule,
    /// Delegate to a specific orchestrator instance
    ScheduleOn { orchestrator: String },
    /// Placeholder shown when delegation is required but nothing can run it
    Unavailable,
}

/// One choice offered to the caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOption {
    pub id: String,
    pub label: String,
    pub choice_label: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: SubmitOptionKind,
    #[serde(default)]
    pub disabled: bool,
}

impl SubmitOption {
    pub fn is_delegated(&self) -> bool {
        !matches!(self.kind, SubmitOptionKind::Execute)
    }

    pub fn is_schedule(&self) -> bool {
        matches!(
            self.kind,
            SubmitOptionKind::Schedule | SubmitOptionKind::ScheduleOn { .. }
        )
    }

    /// `(request_delegation, delegation_target)` forwarded into the payload
    pub fn delegation(&self) -> (bool, Option<String>) {
        match &self.kind {
            SubmitOptionKind::Execute | SubmitOptionKind::Unavailable => (false, None),
            SubmitOptionKind::Schedule => (true, None),
            SubmitOptionKind::ScheduleOn { orchestrator } => (true, Some(orchestrator.clone())),
        }
    }
}

/// Ordered submit choices plus an optional warning
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    pub options: Vec<SubmitOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

const NO_ORCHESTRATORS_WARNING: &str =
    "This operation requires delegated execution, but no orchestrators are registered to run it";

impl SubmitOptions {
    pub fn from_options(options: &ExecutionOptions) -> Self {
        let mut submit = Vec::new();
        let mut warning = None;
        let has_orchestrators = !options.available_orchestrators.is_empty();

        if options.allow_immediate_execution {
            submit.push(SubmitOption {
                id: "execute".into(),
                label: "Execute".into(),
                choice_label: "Execute".into(),
                description: "Run this operation now".into(),
                kind: SubmitOptionKind::Execute,
                disabled: false,
            });
        }

        if options.allow_delegated_execution && !options.orchestrator_registration_enabled {
            submit.push(SubmitOption {
                id: "schedule".into(),
                label: "Schedule".into(),
                choice_label: "Schedule".into(),
                description: "Run this operation in the background".into(),
                kind: SubmitOptionKind::Schedule,
                disabled: false,
            });
        }

        if options.allow_delegated_execution
            && options.orchestrator_registration_enabled
            && has_orchestrators
        {
            for orchestrator in &options.available_orchestrators {
                submit.push(SubmitOption {
                    id: orchestrator.instance_id.clone(),
                    label: "Schedule".into(),
                    choice_label: format!("Schedule on {}", orchestrator.instance_id),
                    description: orchestrator
                        .description
                        .clone()
                        .unwrap_or_else(|| format!("Run this operation on {}", orchestrator.instance_id)),
                    kind: SubmitOptionKind::ScheduleOn {
                        orchestrator: orchestrator.instance_id.clone(),
                    },
                    disabled: false,
                });
            }
        }

        if options.orchestrator_registration_enabled && !has_orchestrators {
            warning = Some(NO_ORCHESTRATORS_WARNING.to_string());
            submit.push(SubmitOption {
                id: "disabled-schedule".into(),
                label: "Schedule".into(),
                choice_label: "Schedule".into(),
                description: "Run this operation on an orchestrator".into(),
                kind: SubmitOptionKind::Unavailable,
                disabled: true,
            });
        }

        // stable: the default choice moves first, relative order otherwise kept
        let prefer_delegated = options.default_choice_to_delegated;
        submit.sort_by_key(|option| option.is_delegated() != prefer_delegated);

        Self {
            options: submit,
            warning,
        }
    }

    pub fn schedule_options(&self) -> impl Iterator<Item = &SubmitOption> {
        self.options.iter().filter(|option| option.is_schedule())
    }

    /// First enabled option, which is the default choice
    pub fn default_option(&self) -> Option<&SubmitOption> {
        self.options.iter().find(|option| !option.disabled)
    }

    pub fn get(&self, id: &str) -> Option<&SubmitOption> {
        self.options.iter().find(|option| option.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
