//! `{{placeholder}}` prompt rendering.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AdvisorError, Result};

/// A named value a prompt template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskInput {
    Configuration,
    ReferenceDocs,
    NewFeatures,
    Inventory,
    DiffScope,
    PageSize,
    Report,
}

impl TaskInput {
    pub fn placeholder(&self) -> &'static str {
        match self {
            TaskInput::Configuration => "configuration",
            TaskInput::ReferenceDocs => "reference_docs",
            TaskInput::NewFeatures => "new_features",
            TaskInput::Inventory => "inventory",
            TaskInput::DiffScope => "diff_scope",
            TaskInput::PageSize => "page_size",
            TaskInput::Report => "report",
        }
    }
}

impl fmt::Display for TaskInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}

impl FromStr for TaskInput {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "configuration" => Ok(TaskInput::Configuration),
            "reference_docs" => Ok(TaskInput::ReferenceDocs),
            "new_features" => Ok(TaskInput::NewFeatures),
            "inventory" => Ok(TaskInput::Inventory),
            "diff_scope" => Ok(TaskInput::DiffScope),
            "page_size" => Ok(TaskInput::PageSize),
            "report" => Ok(TaskInput::Report),
            other => Err(AdvisorError::Template(format!(
                "placeholder '{other}' is not supported"
            ))),
        }
    }
}

/// Values available to prompt rendering. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInputs {
    values: BTreeMap<TaskInput, String>,
}

impl TaskInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, input: TaskInput, value: impl Into<String>) -> Self {
        self.set(input, value);
        self
    }

    pub fn set(&mut self, input: TaskInput, value: impl Into<String>) {
        self.values.insert(input, value.into());
    }

    pub fn get(&self, input: TaskInput) -> Option<&str> {
        self.values
            .get(&input)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Substitute every `{{name}}` in `template` with its input value.
///
/// Single pass: substituted text is never scanned again, so configuration
/// containing `{{` passes through untouched.
pub fn render_prompt(template: &str, inputs: &TaskInputs) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut cursor = 0usize;

    while let Some(open_offset) = template[cursor..].find("{{") {
        let open_index = cursor + open_offset;
        rendered.push_str(&template[cursor..open_index]);
        let close_offset = template[open_index + 2..].find("}}").ok_or_else(|| {
            AdvisorError::Template("template contains unterminated placeholder".to_string())
        })?;
        let close_index = open_index + 2 + close_offset;
        let placeholder = template[open_index + 2..close_index].trim();
        if placeholder.is_empty() {
            return Err(AdvisorError::Template(
                "template contains empty placeholder".to_string(),
            ));
        }

        let input: TaskInput = placeholder.parse()?;
        let value = inputs.get(input).ok_or_else(|| {
            AdvisorError::Template(format!("placeholder '{placeholder}' has no value"))
        })?;
        rendered.push_str(value);
        cursor = close_index + 2;
    }

    rendered.push_str(&template[cursor..]);
    Ok(rendered)
}
