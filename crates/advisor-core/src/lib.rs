//! Advisor-Core: advisory orchestration and inventory-diff engine
//!
//! Gathers the declared inventory of an execution directory, reconciles it
//! against the remote backend, fans the advisory tasks out to a reasoning
//! agent and assembles one deterministic report.
//!
//! ## Layer 2 - Advisory Cycle
//!
//! - `inventory`: state, configuration and documentation collectors
//! - `tasks`: data-driven task descriptors and prompt rendering
//! - `diff`: deterministic remote vs local reconciliation
//! - `orchestrator`: phases, dispatch disciplines, aggregation
//! - `report`: payload emission and optional document rendering

pub mod config;
pub mod diff;
pub mod error;
pub mod inventory;
pub mod obs;
pub mod orchestrator;
pub mod outcome;
pub mod report;
pub mod tasks;
pub mod telemetry;

pub use config::{AdvisorConfig, ExecutionDiscipline};
pub use diff::{resource_label, DiffDirection, DiffMode, ImportAction, InventoryDiff};
pub use error::{AdvisorError, Result};
pub use inventory::{
    collect_attributes_from_state, collect_from_state, collect_raw_configuration,
    collect_reference_docs, DeclaredAttributeSet, DeclaredResource, RawConfigurationText,
};
pub use orchestrator::{AdvisoryOrchestrator, CollectedInputs, CycleOutcome, CyclePhase};
pub use outcome::{FailureKind, TaskFailure, TaskOutcome};
pub use report::{emit, emit_rendered, render, AdvisoryReport, DiagnosticPayload, Severity};
pub use tasks::{render_prompt, AdvisoryTask, CallMode, TaskInput, TaskInputs, TaskKind};
pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
