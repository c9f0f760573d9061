//! Structured observability hooks for the advisory cycle.
//!
//! This module provides:
//! - Cycle-scoped tracing spans via the `CycleSpan` RAII guard
//! - Emission functions for lifecycle events: cycle start, phase change,
//!   task completion and failure, cycle finish
//!
//! Events are emitted at `info!` level (`warn!` for failures). Filtering
//! follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

use crate::orchestrator::CyclePhase;
use crate::outcome::TaskFailure;
use crate::tasks::TaskKind;

/// RAII guard that enters a cycle-scoped tracing span.
///
/// ```ignore
/// let _span = CycleSpan::enter("3f2a...");
/// // every event below carries cycle_id = "3f2a..."
/// ```
pub struct CycleSpan {
    _span: tracing::span::EnteredSpan,
}

impl CycleSpan {
    pub fn enter(cycle_id: &str) -> Self {
        Self {
            _span: cycle_span(cycle_id).entered(),
        }
    }
}

/// The cycle span itself, for instrumenting futures that cross `.await`.
pub fn cycle_span(cycle_id: &str) -> tracing::Span {
    tracing::info_span!("advisor.cycle", cycle_id = %cycle_id)
}

/// Emit event: cycle started for an execution directory.
pub fn emit_cycle_started(cycle_id: &str, execution_dir: &str, tasks: usize) {
    info!(
        event = "cycle.started",
        cycle_id = %cycle_id,
        execution_dir = %execution_dir,
        tasks = tasks,
    );
}

pub fn emit_cycle_phase(cycle_id: &str, phase: CyclePhase) {
    info!(event = "cycle.phase", cycle_id = %cycle_id, phase = %phase);
}

pub fn emit_task_finished(cycle_id: &str, task: TaskKind, duration_ms: u64, bytes: usize) {
    info!(
        event = "task.finished",
        cycle_id = %cycle_id,
        task = %task,
        duration_ms = duration_ms,
        bytes = bytes,
    );
}

/// Emit event: task failed (warning level). The cycle continues.
pub fn emit_task_failed(cycle_id: &str, task: TaskKind, failure: &TaskFailure) {
    warn!(
        event = "task.failed",
        cycle_id = %cycle_id,
        task = %task,
        kind = ?failure.kind,
        error = %failure.message,
    );
}

/// Emit event: cycle finished with duration and failure count.
pub fn emit_cycle_finished(cycle_id: &str, duration_ms: u64, failed_tasks: usize, digest: &str) {
    info!(
        event = "cycle.finished",
        cycle_id = %cycle_id,
        duration_ms = duration_ms,
        failed_tasks = failed_tasks,
        digest = %digest,
    );
}
