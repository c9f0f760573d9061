//! Advisory cycle orchestration.
//!
//! One cycle walks `Collecting -> Dispatching -> Aggregating -> Done`:
//!
//! - collect the declared inventory, configuration text and reference docs
//! - run every enabled task, sequentially or as a bounded fan-out
//! - place each outcome in its own slot and assemble the report in
//!   canonical order, whatever the completion order was
//!
//! A task failure (error, timeout or panic) only empties that task's
//! section. The only fatal condition is an unresolvable execution directory,
//! detected before anything is dispatched.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use advisor_agent::{
    clamp_page_size, list_all_remote, AgentError, ReasoningAgent, RemoteInventory,
    LIST_REMOTE_RESOURCES,
};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

use crate::config::{AdvisorConfig, ExecutionDiscipline};
use crate::diff::{DiffMode, InventoryDiff};
use crate::error::{AdvisorError, Result};
use crate::inventory::{
    collect_attributes_from_state, collect_from_state, collect_raw_configuration,
    collect_reference_docs, DeclaredResource, RawConfigurationText,
};
use crate::obs;
use crate::outcome::{FailureKind, TaskFailure, TaskOutcome};
use crate::report::{emit, emit_rendered, AdvisoryReport, DiagnosticPayload};
use crate::tasks::{format_feature_list, CallMode, TaskInput, TaskInputs, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Collecting,
    Dispatching,
    Aggregating,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Collecting => "collecting",
            CyclePhase::Dispatching => "dispatching",
            CyclePhase::Aggregating => "aggregating",
            CyclePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything the collectors produced for one execution directory.
#[derive(Debug, Clone)]
pub struct CollectedInputs {
    pub execution_dir: PathBuf,
    pub declared: Vec<DeclaredResource>,
    pub configuration: RawConfigurationText,
    pub reference_docs: String,
}

/// Result of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub execution_dir: PathBuf,
    pub report: AdvisoryReport,
    pub payload: DiagnosticPayload,
    pub phases: Vec<CyclePhase>,
}

/// Shared, read-only state handed to every spawned task.
struct TaskContext {
    cycle_id: String,
    config: Arc<AdvisorConfig>,
    agent: Arc<dyn ReasoningAgent>,
    remote: Option<Arc<dyn RemoteInventory>>,
    inputs: TaskInputs,
    declared: Vec<DeclaredResource>,
}

pub struct AdvisoryOrchestrator {
    config: Arc<AdvisorConfig>,
    agent: Arc<dyn ReasoningAgent>,
    remote: Option<Arc<dyn RemoteInventory>>,
}

impl AdvisoryOrchestrator {
    pub fn new(config: AdvisorConfig, agent: Arc<dyn ReasoningAgent>) -> Self {
        Self {
            config: Arc::new(config),
            agent,
            remote: None,
        }
    }

    /// Remote listing used when the diff runs in [`DiffMode::Direct`].
    pub fn with_remote_inventory(mut self, remote: Arc<dyn RemoteInventory>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Run the collectors against a resolved execution directory.
    pub fn collect(&self, execution_dir: &Path) -> CollectedInputs {
        collect_inputs(&self.config, execution_dir)
    }

    /// Render the prompt a task would send, without calling the agent.
    pub fn prompt_for(&self, kind: TaskKind) -> Result<String> {
        preview_prompt(&self.config, kind)
    }

    /// Run one full advisory cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let cycle_id = Uuid::new_v4();
        let span = obs::cycle_span(&cycle_id.to_string());
        self.cycle(cycle_id).instrument(span).await
    }

    async fn cycle(&self, cycle_id: Uuid) -> Result<CycleOutcome> {
        let cycle_label = cycle_id.to_string();
        let started = Instant::now();
        let mut phases = Vec::with_capacity(4);

        let execution_dir = match self.config.resolve_execution_dir() {
            Ok(dir) => dir,
            Err(e) => {
                error!(error = %e, "advisory cycle aborted");
                return Err(e);
            }
        };
        let tasks = self.config.tasks.clone();
        obs::emit_cycle_started(&cycle_label, &execution_dir.display().to_string(), tasks.len());

        phases.push(CyclePhase::Collecting);
        obs::emit_cycle_phase(&cycle_label, CyclePhase::Collecting);
        let collected = self.collect(&execution_dir);

        let ctx = Arc::new(TaskContext {
            cycle_id: cycle_label.clone(),
            config: Arc::clone(&self.config),
            agent: Arc::clone(&self.agent),
            remote: self.remote.clone(),
            inputs: task_inputs(&self.config, &collected),
            declared: collected.declared,
        });

        phases.push(CyclePhase::Dispatching);
        obs::emit_cycle_phase(&cycle_label, CyclePhase::Dispatching);
        let slots = match self.config.discipline {
            ExecutionDiscipline::Sequential => dispatch_sequential(&ctx, &tasks).await,
            ExecutionDiscipline::Concurrent { max_concurrent } => {
                dispatch_concurrent(&ctx, &tasks, max_concurrent).await
            }
        };

        phases.push(CyclePhase::Aggregating);
        obs::emit_cycle_phase(&cycle_label, CyclePhase::Aggregating);
        let sections = aggregate(&tasks, slots);
        for section in &sections {
            match &section.failure {
                None => obs::emit_task_finished(
                    &cycle_label,
                    section.task,
                    section.duration_ms,
                    section.text.len(),
                ),
                Some(failure) => obs::emit_task_failed(&cycle_label, section.task, failure),
            }
        }
        let report = AdvisoryReport::new(cycle_id, sections);

        phases.push(CyclePhase::Done);
        obs::emit_cycle_phase(&cycle_label, CyclePhase::Done);
        let payload = if self.config.render_document {
            emit_rendered(
                &report,
                self.agent.as_ref(),
                &execution_dir,
                &self.config.report_file,
            )
            .await
        } else {
            emit(&report)
        };

        obs::emit_cycle_finished(
            &cycle_label,
            started.elapsed().as_millis() as u64,
            report.failed_sections(),
            &report.digest(),
        );

        Ok(CycleOutcome {
            execution_dir,
            report,
            payload,
            phases,
        })
    }
}

/// Run the collectors against a resolved execution directory.
pub fn collect_inputs(config: &AdvisorConfig, execution_dir: &Path) -> CollectedInputs {
    let state_path = config.state_path(execution_dir);
    let declared = collect_from_state(&state_path);

    for set in collect_attributes_from_state(&state_path) {
        debug!(
            resource_type = %set.resource_type,
            attributes = %serde_json::Value::Object(set.attributes),
            "declared instance"
        );
    }

    let configuration = collect_raw_configuration(execution_dir, &config.config_extension);
    let reference_docs = collect_reference_docs(&config.docs_root(execution_dir));

    debug!(
        declared = declared.len(),
        configuration_bytes = configuration.as_str().len(),
        docs_bytes = reference_docs.len(),
        "inputs collected"
    );

    CollectedInputs {
        execution_dir: execution_dir.to_path_buf(),
        declared,
        configuration,
        reference_docs,
    }
}

/// Prompt inputs derived from collected data and configuration.
pub fn task_inputs(config: &AdvisorConfig, collected: &CollectedInputs) -> TaskInputs {
    let inventory =
        serde_json::to_string(&collected.declared).unwrap_or_else(|_| "[]".to_string());
    TaskInputs::new()
        .with(TaskInput::Configuration, collected.configuration.as_str())
        .with(TaskInput::ReferenceDocs, collected.reference_docs.as_str())
        .with(TaskInput::NewFeatures, format_feature_list(&config.new_features))
        .with(TaskInput::Inventory, inventory)
        .with(TaskInput::DiffScope, config.diff_direction.prompt_scope())
        .with(TaskInput::PageSize, clamp_page_size(config.page_size).to_string())
}

/// Resolve, collect and render one task's prompt. No agent is involved.
pub fn preview_prompt(config: &AdvisorConfig, kind: TaskKind) -> Result<String> {
    let _span = obs::CycleSpan::enter("prompt-preview");
    let execution_dir = config.resolve_execution_dir()?;
    let collected = collect_inputs(config, &execution_dir);
    kind.descriptor().prompt(&task_inputs(config, &collected))
}

async fn dispatch_sequential(ctx: &Arc<TaskContext>, tasks: &[TaskKind]) -> Vec<Option<TaskOutcome>> {
    let mut slots = Vec::with_capacity(tasks.len());
    for &kind in tasks {
        // Spawned so a panic is contained exactly as in the concurrent path.
        let handle = tokio::spawn(run_task(Arc::clone(ctx), kind).in_current_span());
        match handle.await {
            Ok(outcome) => slots.push(Some(outcome)),
            Err(e) => {
                warn!(task = %kind, error = %e, "advisory task aborted");
                slots.push(None);
            }
        }
    }
    slots
}

async fn dispatch_concurrent(
    ctx: &Arc<TaskContext>,
    tasks: &[TaskKind],
    max_concurrent: usize,
) -> Vec<Option<TaskOutcome>> {
    let sem = Arc::new(tokio::sync::Semaphore::new(max_concurrent.max(1)));
    let mut set = JoinSet::new();

    for (idx, &kind) in tasks.iter().enumerate() {
        let ctx = Arc::clone(ctx);
        let sem = Arc::clone(&sem);
        set.spawn(
            async move {
                let _permit = sem.acquire_owned().await.ok();
                (idx, run_task(ctx, kind).await)
            }
            .in_current_span(),
        );
    }

    let mut slots: Vec<Option<TaskOutcome>> = vec![None; tasks.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => slots[idx] = Some(outcome),
            Err(e) => warn!(error = %e, "advisory task aborted"),
        }
    }
    slots
}

/// Canonical-order sections; a slot nobody filled is a panicked task.
fn aggregate(tasks: &[TaskKind], slots: Vec<Option<TaskOutcome>>) -> Vec<TaskOutcome> {
    let mut sections: Vec<TaskOutcome> = tasks
        .iter()
        .zip(slots)
        .map(|(&kind, slot)| {
            slot.unwrap_or_else(|| {
                TaskOutcome::failed(
                    kind,
                    TaskFailure {
                        kind: FailureKind::Panicked,
                        message: format!("task {kind} panicked"),
                    },
                    0,
                )
            })
        })
        .collect();
    sections.sort_by_key(|section| section.task.canonical_index());
    sections
}

async fn run_task(ctx: Arc<TaskContext>, kind: TaskKind) -> TaskOutcome {
    let started = Instant::now();
    let limit = ctx.config.task_timeout;
    let result = match tokio::time::timeout(limit, execute_task(&ctx, kind)).await {
        Ok(result) => result,
        Err(_) => Err(AdvisorError::TaskTimeout {
            task: kind.to_string(),
            timeout_ms: limit.as_millis() as u64,
        }),
    };
    let duration_ms = started.elapsed().as_millis() as u64;
    debug!(cycle_id = %ctx.cycle_id, task = %kind, duration_ms, ok = result.is_ok(), "task returned");
    TaskOutcome::from_result(kind, result, duration_ms)
}

async fn execute_task(ctx: &TaskContext, kind: TaskKind) -> Result<String> {
    if kind == TaskKind::InventoryDiff && ctx.config.diff_mode == DiffMode::Direct {
        return direct_diff(ctx).await;
    }

    let task = kind.descriptor();
    let prompt = task.prompt(&ctx.inputs)?;
    let text = match task.call_mode {
        CallMode::Plain => ctx.agent.query(&prompt).await?,
        CallMode::ToolAugmented => {
            ctx.agent
                .query_with_tools(&prompt, &ctx.config.credentials)
                .await?
        }
    };
    Ok(text)
}

async fn direct_diff(ctx: &TaskContext) -> Result<String> {
    let tool_failure = |message: String| {
        AdvisorError::Agent(AgentError::ToolInvocationFailed {
            tool: LIST_REMOTE_RESOURCES.to_string(),
            message,
        })
    };
    let remote = ctx
        .remote
        .as_ref()
        .ok_or_else(|| tool_failure("no remote inventory configured".to_string()))?;

    let remote_resources = list_all_remote(
        remote.as_ref(),
        &ctx.config.credentials,
        ctx.config.page_size,
        ctx.config.max_pages,
    )
    .await
    .map_err(|e| tool_failure(e.to_string()))?;

    let diff = InventoryDiff::compute(&ctx.declared, &remote_resources, ctx.config.diff_direction);
    Ok(diff.render())
}
