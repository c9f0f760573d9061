//! IaC Advisor CLI
//!
//! The `iac-advisor` command runs one advisory cycle for a Terraform
//! execution directory and prints the resulting diagnostic.
//!
//! ## Commands
//!
//! - `run`: full cycle (collect, dispatch, aggregate, emit)
//! - `inventory`: declared inventory as JSON, optionally reconciled with the
//!   remote backend
//! - `prompt`: render one task's prompt without calling the agent

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use advisor_agent::{
    list_all_remote, AgentConfig, AgentError, BackendCredentials, HttpRemoteInventory,
    OpenAiCompatibleAgent, ReasoningAgent, RemoteResource, UnavailableAgent,
};
use advisor_core::orchestrator::preview_prompt;
use advisor_core::{
    collect_from_state, AdvisorConfig, AdvisoryOrchestrator, CycleOutcome, DeclaredResource,
    DiffDirection, DiffMode, ExecutionDiscipline, InventoryDiff, TaskKind,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "iac-advisor")]
#[command(author = "Stevedores Org")]
#[command(version = advisor_core::VERSION)]
#[command(about = "Advisory reviews and inventory drift for Incapsula Terraform configurations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one advisory cycle and print the diagnostic
    Run {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        agent: AgentArgs,

        /// Run tasks one after another instead of concurrently
        #[arg(long)]
        sequential: bool,

        /// Upper bound on concurrently running tasks
        #[arg(long, default_value_t = 4)]
        max_concurrent: usize,

        /// Per-task timeout in seconds
        #[arg(long, default_value_t = 300)]
        task_timeout_secs: u64,

        /// Only run these tasks (repeatable; default: all)
        #[arg(long = "task", value_enum)]
        tasks: Vec<TaskArg>,

        /// Skip these tasks (repeatable)
        #[arg(long = "skip-task", value_enum)]
        skip_tasks: Vec<TaskArg>,

        /// Who computes the inventory diff
        #[arg(long, value_enum, default_value_t = DiffModeArg::Agent)]
        diff_mode: DiffModeArg,

        /// Which side of the inventory difference to report
        #[arg(long, value_enum, default_value_t = DiffDirectionArg::RemoteOnly)]
        diff_direction: DiffDirectionArg,

        /// Render the report into an HTML document and print its link
        #[arg(long)]
        render: bool,

        /// Print the diagnostic payload as JSON
        #[arg(long)]
        payload_json: bool,
    },

    /// Print the declared inventory of the execution directory
    Inventory {
        #[command(flatten)]
        target: TargetArgs,

        /// Also list the remote inventory and show the remediation diff
        #[arg(long)]
        remote: bool,
    },

    /// Render the prompt a task would send, without calling the agent
    Prompt {
        /// Task to render
        #[arg(value_enum)]
        task: TaskArg,

        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Where to look and how to reach the backend.
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Terraform execution directory (default: current directory)
    #[arg(long, env = "EXECUTION_DIR")]
    execution_dir: Option<PathBuf>,

    /// Backend API id
    #[arg(long, env = "INCAPSULA_API_ID", default_value = "")]
    api_id: String,

    /// Backend API key
    #[arg(long, env = "INCAPSULA_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Base URL of the sites listing API
    #[arg(long, env = "INCAPSULA_BASE_URL_API", default_value = advisor_core::config::DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Reference documentation tree, relative to the execution directory
    #[arg(long, default_value = advisor_core::config::DEFAULT_DOCS_DIR)]
    docs_dir: PathBuf,

    /// Recently released provider feature (repeatable)
    #[arg(long = "feature")]
    features: Vec<String>,

    /// Remote listing page size (1-100)
    #[arg(long, default_value_t = advisor_agent::DEFAULT_PAGE_SIZE)]
    page_size: u32,
}

/// Reasoning agent endpoint.
#[derive(Args, Debug, Clone)]
struct AgentArgs {
    #[arg(long, env = "ADVISOR_AGENT_API_BASE", default_value = "https://api.openai.com/v1")]
    agent_api_base: String,

    #[arg(long, env = "ADVISOR_AGENT_API_KEY", default_value = "", hide_env_values = true)]
    agent_api_key: String,

    #[arg(long, env = "ADVISOR_AGENT_MODEL", default_value = "gpt-4o")]
    agent_model: String,

    /// Per-request timeout for agent calls, in milliseconds
    #[arg(long, default_value_t = 120_000)]
    agent_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TaskArg {
    InventoryDiff,
    GeneralBestPractices,
    DeprecatedResourceReplacement,
    NewFeatureAdoption,
}

impl From<TaskArg> for TaskKind {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::InventoryDiff => TaskKind::InventoryDiff,
            TaskArg::GeneralBestPractices => TaskKind::GeneralBestPractices,
            TaskArg::DeprecatedResourceReplacement => TaskKind::DeprecatedResourceReplacement,
            TaskArg::NewFeatureAdoption => TaskKind::NewFeatureAdoption,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DiffModeArg {
    Agent,
    Direct,
}

impl From<DiffModeArg> for DiffMode {
    fn from(arg: DiffModeArg) -> Self {
        match arg {
            DiffModeArg::Agent => DiffMode::Agent,
            DiffModeArg::Direct => DiffMode::Direct,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DiffDirectionArg {
    RemoteOnly,
    Both,
}

impl From<DiffDirectionArg> for DiffDirection {
    fn from(arg: DiffDirectionArg) -> Self {
        match arg {
            DiffDirectionArg::RemoteOnly => DiffDirection::RemoteOnly,
            DiffDirectionArg::Both => DiffDirection::Both,
        }
    }
}

impl TargetArgs {
    fn to_config(&self) -> AdvisorConfig {
        let mut config = AdvisorConfig::new(self.execution_dir.clone().unwrap_or_default())
            .with_credentials(BackendCredentials::new(&self.api_id, &self.api_key))
            .with_api_base_url(&self.api_base_url)
            .with_docs_dir(&self.docs_dir)
            .with_page_size(self.page_size);
        if !self.features.is_empty() {
            config = config.with_new_features(self.features.clone());
        }
        config
    }
}

/// Enabled tasks: `only` (or all when empty) minus `skip`.
fn select_tasks(only: &[TaskArg], skip: &[TaskArg]) -> Vec<TaskKind> {
    let skip: Vec<TaskKind> = skip.iter().copied().map(TaskKind::from).collect();
    let only: Vec<TaskKind> = only.iter().copied().map(TaskKind::from).collect();
    TaskKind::CANONICAL
        .iter()
        .copied()
        .filter(|kind| only.is_empty() || only.contains(kind))
        .filter(|kind| !skip.contains(kind))
        .collect()
}

fn remote_inventory(config: &AdvisorConfig, timeout_ms: u64) -> Result<Arc<HttpRemoteInventory>> {
    let inventory = HttpRemoteInventory::new(&config.api_base_url, timeout_ms)
        .context("Failed to build remote inventory client")?;
    Ok(Arc::new(inventory))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    advisor_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            target,
            agent,
            sequential,
            max_concurrent,
            task_timeout_secs,
            tasks,
            skip_tasks,
            diff_mode,
            diff_direction,
            render,
            payload_json,
        } => {
            let discipline = if sequential {
                ExecutionDiscipline::Sequential
            } else {
                ExecutionDiscipline::Concurrent { max_concurrent }
            };
            let config = target
                .to_config()
                .with_discipline(discipline)
                .with_task_timeout(Duration::from_secs(task_timeout_secs))
                .with_tasks(&select_tasks(&tasks, &skip_tasks))
                .with_diff(diff_mode.into(), diff_direction.into())
                .with_render_document(render);
            cmd_run(config, &agent, payload_json).await
        }
        Commands::Inventory { target, remote } => cmd_inventory(&target.to_config(), remote).await,
        Commands::Prompt { task, target } => cmd_prompt(&target.to_config(), task.into()),
    }
}

/// Agent client for the cycle. A client that cannot be configured is
/// replaced by one whose every call fails, so tasks degrade individually.
fn build_agent(
    agent_args: &AgentArgs,
    page_size: u32,
    remote: Option<Arc<HttpRemoteInventory>>,
) -> Arc<dyn ReasoningAgent> {
    let Some(remote) = remote else {
        return Arc::new(UnavailableAgent::new(&AgentError::Transport(
            "remote inventory client unavailable".to_string(),
        )));
    };
    let agent_config = AgentConfig::new(
        &agent_args.agent_api_base,
        &agent_args.agent_api_key,
        &agent_args.agent_model,
    )
    .with_request_timeout_ms(agent_args.agent_timeout_ms)
    .with_page_size(page_size);

    match OpenAiCompatibleAgent::new(agent_config, remote) {
        Ok(agent) => Arc::new(agent),
        Err(e) => {
            warn!(error = %e, "reasoning agent not configured, agent tasks will fail");
            Arc::new(UnavailableAgent::new(&e))
        }
    }
}

async fn run_advisory_cycle(config: AdvisorConfig, agent_args: &AgentArgs) -> Result<CycleOutcome> {
    if config.tasks.contains(&TaskKind::InventoryDiff) && !config.credentials.is_complete() {
        warn!("backend credentials incomplete, the inventory diff cannot list remote resources");
    }

    let remote = match remote_inventory(&config, agent_args.agent_timeout_ms) {
        Ok(remote) => Some(remote),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "remote inventory listing unavailable");
            None
        }
    };
    let agent = build_agent(agent_args, config.page_size, remote.clone());

    let mut orchestrator = AdvisoryOrchestrator::new(config, agent);
    if let Some(remote) = remote {
        orchestrator = orchestrator.with_remote_inventory(remote);
    }
    orchestrator
        .run_cycle()
        .await
        .context("Advisory cycle aborted")
}

async fn cmd_run(config: AdvisorConfig, agent_args: &AgentArgs, payload_json: bool) -> Result<()> {
    let outcome = run_advisory_cycle(config, agent_args).await?;

    info!(
        cycle_id = %outcome.report.cycle_id,
        failed_tasks = outcome.report.failed_sections(),
        digest = %outcome.report.digest(),
        "advisory cycle complete"
    );

    if payload_json {
        println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
    } else {
        println!("Warning: {}", outcome.payload.summary);
        println!();
        println!("{}", outcome.payload.detail);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct InventoryView {
    execution_dir: PathBuf,
    declared: Vec<DeclaredResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<Vec<RemoteResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<InventoryDiff>,
}

fn declared_inventory(config: &AdvisorConfig) -> Result<(PathBuf, Vec<DeclaredResource>)> {
    let execution_dir = config
        .resolve_execution_dir()
        .context("Cannot resolve execution directory")?;
    let declared = collect_from_state(&config.state_path(&execution_dir));
    Ok((execution_dir, declared))
}

async fn cmd_inventory(config: &AdvisorConfig, with_remote: bool) -> Result<()> {
    let (execution_dir, declared) = declared_inventory(config)?;

    let (remote, diff) = if with_remote {
        let listing = remote_inventory(config, 30_000)?;
        let remote = list_all_remote(
            listing.as_ref(),
            &config.credentials,
            config.page_size,
            config.max_pages,
        )
        .await
        .context("Failed to list remote inventory")?;
        let diff = InventoryDiff::compute(&declared, &remote, DiffDirection::Both);
        (Some(remote), Some(diff))
    } else {
        (None, None)
    };

    let view = InventoryView {
        execution_dir,
        declared,
        remote,
        diff,
    };
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn cmd_prompt(config: &AdvisorConfig, task: TaskKind) -> Result<()> {
    let prompt = render_task_prompt(config, task)?;
    println!("{prompt}");
    Ok(())
}

fn render_task_prompt(config: &AdvisorConfig, task: TaskKind) -> Result<String> {
    preview_prompt(config, task).with_context(|| format!("Failed to render prompt for {task}"))
}
