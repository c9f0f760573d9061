//! Report assembly and emission.

use std::path::{Path, PathBuf};

use advisor_agent::ReasoningAgent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AdvisorError, Result};
use crate::outcome::TaskOutcome;
use crate::tasks::{render_prompt, TaskInput, TaskInputs, RENDER_TEMPLATE};

pub const SECTION_SEPARATOR: &str = "\n";
pub const DIAGNOSTIC_SUMMARY: &str = "Best Practice Suggestion";

const ROBOT_BANNER: &str = r"
        [ advisor bot ]
          .-------.
          | o   o |
          |   ^   |
          | \___/ |
          '---+---'
         /|   |   |\
        / |___|___| \
           |     |
          _|     |_
";

/// The aggregated output of one cycle. Sections follow canonical task order.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryReport {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<TaskOutcome>,
}

impl AdvisoryReport {
    pub fn new(cycle_id: Uuid, sections: Vec<TaskOutcome>) -> Self {
        Self {
            cycle_id,
            generated_at: Utc::now(),
            sections,
        }
    }

    /// Section texts joined by [`SECTION_SEPARATOR`]; failed sections are empty.
    pub fn body(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.text.as_str())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    /// SHA-256 of [`Self::body`], hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn failed_sections(&self) -> usize {
        self.sections.iter().filter(|s| !s.is_success()).count()
    }
}

/// Advisories never fail a provisioning run, so warning is the only level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

/// Advisory attached to the provisioning run's diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticPayload {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

fn warning(detail: String) -> DiagnosticPayload {
    DiagnosticPayload {
        severity: Severity::Warning,
        summary: DIAGNOSTIC_SUMMARY.to_string(),
        detail,
    }
}

/// Wrap the report body as a warning-level payload. Never fails.
pub fn emit(report: &AdvisoryReport) -> DiagnosticPayload {
    warning(report.body())
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    match regex::Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$") {
        Ok(re) => re
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| AdvisorError::RenderFailed(e.to_string()))?;
    Ok(cwd.join(path))
}

fn file_link(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Banner plus a link to the rendered document.
pub fn decorate_link(link: &str) -> String {
    format!("{ROBOT_BANNER}\nThe full set of recommendations is available at: {link}")
}

/// Have the agent restyle the report as HTML and persist it.
///
/// Writes `report_file` under `execution_dir` and returns the decorated
/// `file://` link.
pub async fn render(
    report: &AdvisoryReport,
    agent: &dyn ReasoningAgent,
    execution_dir: &Path,
    report_file: &str,
) -> Result<String> {
    let inputs = TaskInputs::new().with(TaskInput::Report, report.body());
    let prompt = render_prompt(RENDER_TEMPLATE, &inputs)
        .map_err(|e| AdvisorError::RenderFailed(e.to_string()))?;

    let html = agent
        .query(&prompt)
        .await
        .map_err(|e| AdvisorError::RenderFailed(e.to_string()))?;
    let html = strip_code_fences(&html);
    if html.is_empty() {
        return Err(AdvisorError::RenderFailed(
            "agent returned an empty document".to_string(),
        ));
    }

    let path = absolute_path(&execution_dir.join(report_file))?;
    tokio::fs::write(&path, html)
        .await
        .map_err(|e| AdvisorError::RenderFailed(format!("{}: {e}", path.display())))?;

    info!(path = %path.display(), "rendered advisory report");
    Ok(decorate_link(&file_link(&path)))
}

/// [`render`], falling back to [`emit`] when rendering fails.
pub async fn emit_rendered(
    report: &AdvisoryReport,
    agent: &dyn ReasoningAgent,
    execution_dir: &Path,
    report_file: &str,
) -> DiagnosticPayload {
    match render(report, agent, execution_dir, report_file).await {
        Ok(link) => warning(link),
        Err(e) => {
            warn!(error = %e, "report rendering failed, emitting raw text");
            emit(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskKind;
    use advisor_agent::fakes::ScriptedAgent;
    use tempfile::tempdir;

    fn report(texts: &[&str]) -> AdvisoryReport {
        let sections = TaskKind::CANONICAL
            .iter()
            .zip(texts)
            .map(|(kind, text)| TaskOutcome::succeeded(*kind, text.to_string(), 1))
            .collect();
        AdvisoryReport::new(Uuid::new_v4(), sections)
    }

    #[test]
    fn test_body_joins_sections_with_newline() {
        assert_eq!(report(&["a", "b", "c"]).body(), "a\nb\nc");
    }

    #[test]
    fn test_digest_depends_only_on_body() {
        let first = report(&["a", "", "c"]);
        let second = report(&["a", "", "c"]);
        assert_ne!(first.cycle_id, second.cycle_id);
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().len(), 64);
        assert_ne!(first.digest(), report(&["a", "b", "c"]).digest());
    }

    #[test]
    fn test_emit_never_fails_on_any_text() {
        let large = "x".repeat(2 * 1024 * 1024);
        let special = "<script>\"'\\ {{ }} \u{0} ünïcödé 🤖";
        for text in ["", large.as_str(), special] {
            let payload = emit(&report(&[text]));
            assert_eq!(payload.severity, Severity::Warning);
            assert_eq!(payload.summary, DIAGNOSTIC_SUMMARY);
            assert_eq!(payload.detail, text);
        }
    }

    #[test]
    fn test_emit_on_empty_report() {
        let payload = emit(&AdvisoryReport::new(Uuid::new_v4(), Vec::new()));
        assert_eq!(payload.detail, "");
        assert_eq!(payload.severity, Severity::Warning);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```html\n<html></html>\n```"), "<html></html>");
        assert_eq!(strip_code_fences("```\n<p>x</p>```"), "<p>x</p>");
        assert_eq!(strip_code_fences("  <html></html>\n"), "<html></html>");
    }

    #[tokio::test]
    async fn test_render_writes_document_and_returns_link() {
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new().respond("REPORT RENDERING", "```html\n<html>ok</html>\n```");

        let link = render(&report(&["a"]), &agent, dir.path(), "llm_suggestion.html")
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("llm_suggestion.html")).unwrap();
        assert_eq!(written, "<html>ok</html>");
        assert!(link.contains("file://"));
        assert!(link.contains("llm_suggestion.html"));
        assert!(agent.prompts()[0].contains("Report:\na"));
    }

    #[tokio::test]
    async fn test_emit_rendered_falls_back_to_raw_text() {
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new().fail("REPORT RENDERING", "service down");

        let payload =
            emit_rendered(&report(&["raw advice"]), &agent, dir.path(), "llm_suggestion.html")
                .await;

        assert_eq!(payload.detail, "raw advice");
        assert_eq!(payload.severity, Severity::Warning);
        assert!(!dir.path().join("llm_suggestion.html").exists());
    }

    #[tokio::test]
    async fn test_render_fails_when_directory_is_missing() {
        let dir = tempdir().unwrap();
        let agent = ScriptedAgent::new().respond("REPORT RENDERING", "<html></html>");
        let err = render(&report(&["a"]), &agent, &dir.path().join("gone"), "out.html")
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::RenderFailed(_)));
    }
}
