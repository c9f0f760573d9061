//! Immutable advisory configuration.
//!
//! Built once by the caller and shared by reference (or `Arc`) with every
//! component; nothing in the engine reads process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use advisor_agent::{BackendCredentials, DEFAULT_PAGE_SIZE};

use crate::diff::{DiffDirection, DiffMode};
use crate::error::{AdvisorError, Result};
use crate::tasks::TaskKind;

/// Root of the backend REST API serving the sites listing.
pub const DEFAULT_API_BASE_URL: &str = "https://api.imperva.com";

pub const DEFAULT_STATE_FILE: &str = "terraform.tfstate";
pub const DEFAULT_CONFIG_EXTENSION: &str = "tf";
pub const DEFAULT_DOCS_DIR: &str = "website";
pub const DEFAULT_REPORT_FILE: &str = "llm_suggestion.html";

/// How the task set is dispatched. Both produce identical reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionDiscipline {
    Sequential,
    Concurrent { max_concurrent: usize },
}

impl Default for ExecutionDiscipline {
    fn default() -> Self {
        ExecutionDiscipline::Concurrent { max_concurrent: 4 }
    }
}

/// Configuration for one advisory cycle.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Directory holding the state snapshot and configuration files.
    /// Empty means the process working directory.
    pub execution_dir: PathBuf,
    pub state_file: String,
    /// Extension (without dot) of declared-configuration files.
    pub config_extension: String,
    /// Reference documentation tree; relative paths resolve against the
    /// execution directory.
    pub docs_dir: PathBuf,
    pub credentials: BackendCredentials,
    /// Backend API root used by the remote inventory listing.
    pub api_base_url: String,
    pub discipline: ExecutionDiscipline,
    /// Upper bound for a single task, agent calls included.
    pub task_timeout: Duration,
    /// Enabled tasks. Reports always follow canonical order.
    pub tasks: Vec<TaskKind>,
    /// Recently released provider features.
    pub new_features: Vec<String>,
    pub page_size: u32,
    pub max_pages: u32,
    pub diff_direction: DiffDirection,
    pub diff_mode: DiffMode,
    /// Render the report into a document instead of emitting raw text.
    pub render_document: bool,
    pub report_file: String,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            execution_dir: PathBuf::new(),
            state_file: DEFAULT_STATE_FILE.to_string(),
            config_extension: DEFAULT_CONFIG_EXTENSION.to_string(),
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            credentials: BackendCredentials::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            discipline: ExecutionDiscipline::default(),
            task_timeout: Duration::from_secs(300),
            tasks: TaskKind::CANONICAL.to_vec(),
            new_features: vec!["site level managed certificate".to_string()],
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: 100,
            diff_direction: DiffDirection::default(),
            diff_mode: DiffMode::default(),
            render_document: false,
            report_file: DEFAULT_REPORT_FILE.to_string(),
        }
    }
}

impl AdvisorConfig {
    pub fn new(execution_dir: impl Into<PathBuf>) -> Self {
        Self {
            execution_dir: execution_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, credentials: BackendCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_api_base_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = api_base_url.to_string();
        self
    }

    pub fn with_discipline(mut self, discipline: ExecutionDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Enable exactly `tasks`; duplicates are dropped and order is
    /// normalised to canonical order.
    pub fn with_tasks(mut self, tasks: &[TaskKind]) -> Self {
        self.tasks = TaskKind::CANONICAL
            .iter()
            .copied()
            .filter(|kind| tasks.contains(kind))
            .collect();
        self
    }

    pub fn with_new_features(mut self, features: Vec<String>) -> Self {
        self.new_features = features;
        self
    }

    pub fn with_docs_dir(mut self, docs_dir: impl Into<PathBuf>) -> Self {
        self.docs_dir = docs_dir.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_diff(mut self, mode: DiffMode, direction: DiffDirection) -> Self {
        self.diff_mode = mode;
        self.diff_direction = direction;
        self
    }

    pub fn with_render_document(mut self, render: bool) -> Self {
        self.render_document = render;
        self
    }

    /// Resolve the execution directory, or fail the cycle.
    ///
    /// An empty setting falls back to the working directory. The directory
    /// must exist and be listable.
    pub fn resolve_execution_dir(&self) -> Result<PathBuf> {
        let dir = if self.execution_dir.as_os_str().is_empty() {
            std::env::current_dir().map_err(|e| AdvisorError::ExecutionDirUnresolvable {
                path: PathBuf::from("."),
                reason: e.to_string(),
            })?
        } else {
            self.execution_dir.clone()
        };

        let unresolvable = |reason: String| AdvisorError::ExecutionDirUnresolvable {
            path: dir.clone(),
            reason,
        };

        let metadata = std::fs::metadata(&dir).map_err(|e| unresolvable(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(unresolvable("not a directory".to_string()));
        }
        std::fs::read_dir(&dir).map_err(|e| unresolvable(e.to_string()))?;

        Ok(dir)
    }

    pub fn state_path(&self, execution_dir: &Path) -> PathBuf {
        execution_dir.join(&self.state_file)
    }

    pub fn docs_root(&self, execution_dir: &Path) -> PathBuf {
        if self.docs_dir.is_absolute() {
            self.docs_dir.clone()
        } else {
            execution_dir.join(&self.docs_dir)
        }
    }
}
