//! Advisory task descriptors.
//!
//! Every task is one static [`AdvisoryTask`]: a template, the inputs it
//! needs and the agent call mode. Building a prompt is the same generic
//! render step for all of them.

mod template;

pub use template::{render_prompt, TaskInput, TaskInputs};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};

/// The canonical advisory tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    InventoryDiff,
    GeneralBestPractices,
    DeprecatedResourceReplacement,
    NewFeatureAdoption,
}

impl TaskKind {
    /// Declaration order; reports are always assembled in this order.
    pub const CANONICAL: [TaskKind; 4] = [
        TaskKind::InventoryDiff,
        TaskKind::GeneralBestPractices,
        TaskKind::DeprecatedResourceReplacement,
        TaskKind::NewFeatureAdoption,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::InventoryDiff => "inventory-diff",
            TaskKind::GeneralBestPractices => "general-best-practices",
            TaskKind::DeprecatedResourceReplacement => "deprecated-resource-replacement",
            TaskKind::NewFeatureAdoption => "new-feature-adoption",
        }
    }

    pub fn canonical_index(&self) -> usize {
        match self {
            TaskKind::InventoryDiff => 0,
            TaskKind::GeneralBestPractices => 1,
            TaskKind::DeprecatedResourceReplacement => 2,
            TaskKind::NewFeatureAdoption => 3,
        }
    }

    pub fn descriptor(&self) -> &'static AdvisoryTask {
        &TASKS[self.canonical_index()]
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TaskKind::CANONICAL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown advisory task: {s}"))
    }
}

/// How a task reaches the reasoning agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Plain,
    /// The agent may call the remote listing tool before answering.
    ToolAugmented,
}

/// Static description of one advisory task.
#[derive(Debug)]
pub struct AdvisoryTask {
    pub kind: TaskKind,
    pub template: &'static str,
    pub required_inputs: &'static [TaskInput],
    pub call_mode: CallMode,
}

impl AdvisoryTask {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Render this task's prompt, failing on the first absent required input.
    pub fn prompt(&self, inputs: &TaskInputs) -> Result<String> {
        if let Some(missing) = self
            .required_inputs
            .iter()
            .find(|input| inputs.get(**input).is_none())
        {
            return Err(AdvisorError::MissingInput {
                task: self.name().to_string(),
                input: missing.to_string(),
            });
        }
        render_prompt(self.template, inputs)
    }
}

static TASKS: [AdvisoryTask; 4] = [
    AdvisoryTask {
        kind: TaskKind::InventoryDiff,
        template: include_str!("../../templates/inventory-diff.md"),
        required_inputs: &[TaskInput::Inventory, TaskInput::DiffScope, TaskInput::PageSize],
        call_mode: CallMode::ToolAugmented,
    },
    AdvisoryTask {
        kind: TaskKind::GeneralBestPractices,
        template: include_str!("../../templates/general-best-practices.md"),
        required_inputs: &[TaskInput::Configuration],
        call_mode: CallMode::Plain,
    },
    AdvisoryTask {
        kind: TaskKind::DeprecatedResourceReplacement,
        template: include_str!("../../templates/deprecated-resource-replacement.md"),
        required_inputs: &[TaskInput::Configuration, TaskInput::ReferenceDocs],
        call_mode: CallMode::Plain,
    },
    AdvisoryTask {
        kind: TaskKind::NewFeatureAdoption,
        template: include_str!("../../templates/new-feature-adoption.md"),
        required_inputs: &[
            TaskInput::Configuration,
            TaskInput::ReferenceDocs,
            TaskInput::NewFeatures,
        ],
        call_mode: CallMode::Plain,
    },
];

/// Template used to turn a finished report into an HTML page.
pub const RENDER_TEMPLATE: &str = include_str!("../../templates/render-report.md");

/// Bullet list used for the `new_features` input.
pub fn format_feature_list(features: &[String]) -> String {
    features
        .iter()
        .map(|feature| format!("- {feature}"))
        .collect::<Vec<_>>()
        .join("\n")
}
