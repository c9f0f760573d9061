//! End-to-end advisory cycles against scripted agents and static listings.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use advisor_agent::fakes::{ScriptedAgent, StaticRemoteInventory};
use advisor_agent::{
    AgentError, BackendCredentials, ReasoningAgent, RemoteResource, UnavailableAgent,
};
use advisor_core::{
    AdvisorConfig, AdvisorError, AdvisoryOrchestrator, CyclePhase, DiffDirection, DiffMode,
    ExecutionDiscipline, FailureKind, Severity, TaskKind,
};
use async_trait::async_trait;
use tempfile::{tempdir, TempDir};

const DIFF: &str = "ADVISORY TASK: inventory-diff";
const BEST: &str = "ADVISORY TASK: general-best-practices";
const DEPRECATED: &str = "ADVISORY TASK: deprecated-resource-replacement";
const FEATURES: &str = "ADVISORY TASK: new-feature-adoption";
const SITE: &str = "incapsula_site_v3";

fn workspace() -> TempDir {
    let dir = tempdir().unwrap();
    write_workspace(dir.path());
    dir
}

fn write_workspace(root: &Path) {
    std::fs::write(
        root.join("terraform.tfstate"),
        r#"{"resources":[{"type":"incapsula_site_v3","instances":[{"attributes":{"id":"1","name":"a.example.com"}}]}]}"#,
    )
    .unwrap();
    std::fs::write(
        root.join("main.tf"),
        "resource \"incapsula_site_v3\" \"a\" {\n  name = \"a.example.com\"\n}\n",
    )
    .unwrap();
    std::fs::create_dir_all(root.join("website/docs/r")).unwrap();
    std::fs::write(root.join("website/docs/r/site_v3.md"), "# incapsula_site_v3\n").unwrap();
}

fn scripted_with_delays(delays_ms: [u64; 4]) -> ScriptedAgent {
    ScriptedAgent::new()
        .respond_after(DIFF, Duration::from_millis(delays_ms[0]), "diff")
        .respond_after(BEST, Duration::from_millis(delays_ms[1]), "best")
        .respond_after(DEPRECATED, Duration::from_millis(delays_ms[2]), "deprecated")
        .respond_after(FEATURES, Duration::from_millis(delays_ms[3]), "features")
}

fn orchestrator(dir: &Path, agent: Arc<dyn ReasoningAgent>) -> AdvisoryOrchestrator {
    let config = AdvisorConfig::new(dir).with_credentials(BackendCredentials::new("acct", "secret"));
    AdvisoryOrchestrator::new(config, agent)
}

#[tokio::test(start_paused = true)]
async fn integration_report_order_is_canonical_for_any_latency() {
    let dir = workspace();
    let permutations = [
        [40, 30, 20, 10],
        [10, 20, 30, 40],
        [25, 5, 40, 15],
        [0, 0, 0, 0],
    ];

    for delays in permutations {
        let agent = Arc::new(scripted_with_delays(delays));
        let outcome = orchestrator(dir.path(), agent.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(outcome.report.body(), "diff\nbest\ndeprecated\nfeatures");
        let tasks: Vec<TaskKind> = outcome.report.sections.iter().map(|s| s.task).collect();
        assert_eq!(tasks, TaskKind::CANONICAL.to_vec());
        assert_eq!(agent.prompts().len(), 4);
    }
}

#[tokio::test(start_paused = true)]
async fn integration_completion_order_differs_from_report_order() {
    let dir = workspace();
    let agent = Arc::new(scripted_with_delays([40, 30, 20, 10]));

    let outcome = orchestrator(dir.path(), agent.clone())
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(agent.completion_order(), vec![FEATURES, DEPRECATED, BEST, DIFF]);
    assert_eq!(outcome.report.body(), "diff\nbest\ndeprecated\nfeatures");
}

#[tokio::test]
async fn integration_failing_task_contributes_empty_segment() {
    let dir = workspace();
    let agent = Arc::new(
        ScriptedAgent::new()
            .respond(DIFF, "diff")
            .fail(BEST, "connection reset")
            .respond(DEPRECATED, "deprecated")
            .respond(FEATURES, "features"),
    );

    let outcome = orchestrator(dir.path(), agent).run_cycle().await.unwrap();

    assert_eq!(outcome.report.body(), "diff\n\ndeprecated\nfeatures");
    let failed = &outcome.report.sections[1];
    assert_eq!(failed.task, TaskKind::GeneralBestPractices);
    assert_eq!(failed.failure.as_ref().unwrap().kind, FailureKind::AgentCallFailed);
    assert_eq!(outcome.report.failed_sections(), 1);
    assert_eq!(outcome.payload.severity, Severity::Warning);
    assert_eq!(outcome.payload.detail, outcome.report.body());
}

#[tokio::test]
async fn integration_refusal_is_classified() {
    let dir = workspace();
    let agent = Arc::new(
        ScriptedAgent::new()
            .refuse(DIFF, "policy")
            .respond(BEST, "best")
            .respond(DEPRECATED, "deprecated")
            .respond(FEATURES, "features"),
    );

    let outcome = orchestrator(dir.path(), agent).run_cycle().await.unwrap();

    let diff = &outcome.report.sections[0];
    assert_eq!(diff.text, "");
    assert_eq!(diff.failure.as_ref().unwrap().kind, FailureKind::AgentRefused);
    assert_eq!(outcome.report.body(), "\nbest\ndeprecated\nfeatures");
}

#[tokio::test(start_paused = true)]
async fn integration_sequential_and_concurrent_reports_match() {
    let dir = workspace();

    let sequential = AdvisoryOrchestrator::new(
        AdvisorConfig::new(dir.path()).with_discipline(ExecutionDiscipline::Sequential),
        Arc::new(scripted_with_delays([30, 20, 10, 0])),
    )
    .run_cycle()
    .await
    .unwrap();

    let concurrent = AdvisoryOrchestrator::new(
        AdvisorConfig::new(dir.path())
            .with_discipline(ExecutionDiscipline::Concurrent { max_concurrent: 2 }),
        Arc::new(scripted_with_delays([30, 20, 10, 0])),
    )
    .run_cycle()
    .await
    .unwrap();

    assert_eq!(sequential.report.body(), concurrent.report.body());
    assert_eq!(sequential.report.digest(), concurrent.report.digest());
}

#[tokio::test(start_paused = true)]
async fn integration_sequential_runs_in_declaration_order() {
    let dir = workspace();
    let agent = Arc::new(scripted_with_delays([40, 30, 20, 10]));

    AdvisoryOrchestrator::new(
        AdvisorConfig::new(dir.path()).with_discipline(ExecutionDiscipline::Sequential),
        agent.clone(),
    )
    .run_cycle()
    .await
    .unwrap();

    assert_eq!(agent.completion_order(), vec![DIFF, BEST, DEPRECATED, FEATURES]);
}

#[tokio::test(start_paused = true)]
async fn integration_slow_task_times_out_without_blocking_siblings() {
    let dir = workspace();
    let agent = Arc::new(scripted_with_delays([0, 600_000, 0, 0]));
    let config = AdvisorConfig::new(dir.path()).with_task_timeout(Duration::from_secs(1));

    let outcome = AdvisoryOrchestrator::new(config, agent)
        .run_cycle()
        .await
        .unwrap();

    let slow = &outcome.report.sections[1];
    assert_eq!(slow.failure.as_ref().unwrap().kind, FailureKind::Timeout);
    assert!(slow.failure.as_ref().unwrap().message.contains("1000ms"));
    assert_eq!(outcome.report.body(), "diff\n\ndeprecated\nfeatures");
}

struct PanickingAgent {
    inner: ScriptedAgent,
}

#[async_trait]
impl ReasoningAgent for PanickingAgent {
    async fn query(&self, prompt: &str) -> advisor_agent::Result<String> {
        if prompt.contains(DEPRECATED) {
            panic!("agent blew up");
        }
        self.inner.query(prompt).await
    }

    async fn query_with_tools(
        &self,
        prompt: &str,
        credentials: &BackendCredentials,
    ) -> advisor_agent::Result<String> {
        self.inner.query_with_tools(prompt, credentials).await
    }
}

#[tokio::test]
async fn integration_panicking_task_is_recorded_in_both_disciplines() {
    let dir = workspace();
    for discipline in [
        ExecutionDiscipline::Sequential,
        ExecutionDiscipline::Concurrent { max_concurrent: 4 },
    ] {
        let agent = Arc::new(PanickingAgent {
            inner: scripted_with_delays([0, 0, 0, 0]),
        });
        let outcome = AdvisoryOrchestrator::new(
            AdvisorConfig::new(dir.path()).with_discipline(discipline),
            agent,
        )
        .run_cycle()
        .await
        .unwrap();

        let crashed = &outcome.report.sections[2];
        assert_eq!(crashed.task, TaskKind::DeprecatedResourceReplacement);
        assert_eq!(crashed.failure.as_ref().unwrap().kind, FailureKind::Panicked);
        assert_eq!(outcome.report.body(), "diff\nbest\n\nfeatures");
    }
}

#[tokio::test]
async fn integration_unresolvable_execution_dir_aborts_before_dispatch() {
    let dir = tempdir().unwrap();
    let agent = Arc::new(scripted_with_delays([0, 0, 0, 0]));

    let result = orchestrator(&dir.path().join("missing"), agent.clone())
        .run_cycle()
        .await;

    assert!(matches!(
        result,
        Err(AdvisorError::ExecutionDirUnresolvable { .. })
    ));
    assert!(agent.prompts().is_empty());
}

#[tokio::test]
async fn integration_file_as_execution_dir_is_fatal() {
    let dir = workspace();
    let agent = Arc::new(scripted_with_delays([0, 0, 0, 0]));

    let result = orchestrator(&dir.path().join("main.tf"), agent.clone())
        .run_cycle()
        .await;

    assert!(result.is_err());
    assert!(agent.prompts().is_empty());
}

#[tokio::test]
async fn integration_missing_state_and_docs_degrade() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("main.tf"), "variable \"x\" {}").unwrap();
    let agent = Arc::new(scripted_with_delays([0, 0, 0, 0]));

    let outcome = orchestrator(dir.path(), agent.clone())
        .run_cycle()
        .await
        .unwrap();

    // Empty local inventory is still a valid diff input.
    assert_eq!(outcome.report.sections[0].text, "diff");
    assert_eq!(outcome.report.sections[1].text, "best");
    for section in &outcome.report.sections[2..] {
        assert_eq!(section.failure.as_ref().unwrap().kind, FailureKind::Prompt);
    }
    assert!(agent
        .prompts()
        .iter()
        .any(|p| p.starts_with(DIFF) && p.ends_with("[]\n")));
    assert_eq!(outcome.phases.len(), 4);
}

#[tokio::test]
async fn integration_agent_diff_reports_only_remote_only_resources() {
    let dir = workspace();
    let remote = StaticRemoteInventory::new(vec![
        RemoteResource::new(SITE, "1", "a.example.com"),
        RemoteResource::new(SITE, "2", "b.example.com"),
    ]);
    let agent = Arc::new(
        ScriptedAgent::new()
            .diff_against(DIFF, Box::new(remote))
            .respond(BEST, "best")
            .respond(DEPRECATED, "deprecated")
            .respond(FEATURES, "features"),
    );

    let outcome = orchestrator(dir.path(), agent.clone())
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(outcome.report.sections[0].text, "2");
    assert_eq!(
        agent.tool_call_credentials(),
        vec![BackendCredentials::new("acct", "secret")]
    );
    let diff_prompt = agent
        .prompts()
        .into_iter()
        .find(|p| p.contains(DIFF))
        .unwrap();
    assert!(diff_prompt.contains(r#"{"type":"incapsula_site_v3","id":"1"}"#));
    assert!(diff_prompt.contains("page size of 100"));
}

#[tokio::test]
async fn integration_direct_diff_renders_remediation() {
    let dir = workspace();
    let remote = Arc::new(StaticRemoteInventory::new(vec![
        RemoteResource::new(SITE, "1", "a.example.com"),
        RemoteResource::new(SITE, "2", "b.example.com"),
    ]));
    let config = AdvisorConfig::new(dir.path())
        .with_tasks(&[TaskKind::InventoryDiff])
        .with_page_size(1)
        .with_diff(DiffMode::Direct, DiffDirection::RemoteOnly);
    let agent = Arc::new(ScriptedAgent::new());

    let outcome = AdvisoryOrchestrator::new(config, agent.clone())
        .with_remote_inventory(remote.clone())
        .run_cycle()
        .await
        .unwrap();

    let text = &outcome.report.sections[0].text;
    assert!(text.starts_with("add these resources to your configuration:\n"));
    assert!(text.contains("terraform import incapsula_site_v3.b_example_com 2\n"));
    assert!(!text.contains("a.example.com"));
    assert_eq!(remote.pages_served(), vec![1, 2]);
    assert!(agent.prompts().is_empty());
}

#[tokio::test]
async fn integration_unconfigured_agent_degrades_per_task() {
    let dir = workspace();
    let remote = Arc::new(StaticRemoteInventory::new(vec![RemoteResource::new(
        SITE,
        "2",
        "b.example.com",
    )]));
    let config = AdvisorConfig::new(dir.path()).with_diff(DiffMode::Direct, DiffDirection::RemoteOnly);
    let agent = Arc::new(UnavailableAgent::new(&AgentError::MissingApiKey));

    let outcome = AdvisoryOrchestrator::new(config, agent)
        .with_remote_inventory(remote)
        .run_cycle()
        .await
        .unwrap();

    assert!(outcome.report.sections[0].is_success());
    assert!(outcome.report.sections[0]
        .text
        .contains("terraform import incapsula_site_v3.b_example_com 2\n"));
    for section in &outcome.report.sections[1..] {
        assert_eq!(section.text, "");
        assert_eq!(
            section.failure.as_ref().unwrap().kind,
            FailureKind::AgentCallFailed
        );
    }
    assert_eq!(outcome.payload.severity, Severity::Warning);
    assert_eq!(outcome.payload.detail, outcome.report.body());
}

#[tokio::test]
async fn integration_direct_diff_with_empty_sets_is_empty() {
    let dir = tempdir().unwrap();
    let config = AdvisorConfig::new(dir.path())
        .with_tasks(&[TaskKind::InventoryDiff])
        .with_diff(DiffMode::Direct, DiffDirection::Both);

    let outcome = AdvisoryOrchestrator::new(config, Arc::new(ScriptedAgent::new()))
        .with_remote_inventory(Arc::new(StaticRemoteInventory::new(vec![])))
        .run_cycle()
        .await
        .unwrap();

    assert!(outcome.report.sections[0].is_success());
    assert_eq!(outcome.report.body(), "");
}

#[tokio::test]
async fn integration_direct_diff_listing_failure_emits_nothing() {
    let dir = workspace();
    let config = AdvisorConfig::new(dir.path())
        .with_tasks(&[TaskKind::InventoryDiff])
        .with_diff(DiffMode::Direct, DiffDirection::RemoteOnly);

    let outcome = AdvisoryOrchestrator::new(config, Arc::new(ScriptedAgent::new()))
        .with_remote_inventory(Arc::new(StaticRemoteInventory::failing("bad key")))
        .run_cycle()
        .await
        .unwrap();

    let diff = &outcome.report.sections[0];
    assert_eq!(diff.text, "");
    assert_eq!(
        diff.failure.as_ref().unwrap().kind,
        FailureKind::ToolInvocationFailed
    );
}

#[tokio::test]
async fn integration_disabled_tasks_are_not_dispatched() {
    let dir = workspace();
    let agent = Arc::new(scripted_with_delays([0, 0, 0, 0]));
    let config = AdvisorConfig::new(dir.path()).with_tasks(&[TaskKind::GeneralBestPractices]);

    let outcome = AdvisoryOrchestrator::new(config, agent.clone())
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(outcome.report.body(), "best");
    assert_eq!(agent.prompts().len(), 1);
    assert_eq!(
        outcome.phases,
        vec![
            CyclePhase::Collecting,
            CyclePhase::Dispatching,
            CyclePhase::Aggregating,
            CyclePhase::Done
        ]
    );
}

#[tokio::test]
async fn integration_rendered_report_links_document() {
    let dir = workspace();
    let agent = Arc::new(
        scripted_with_delays([0, 0, 0, 0]).respond("REPORT RENDERING", "<html>report</html>"),
    );
    let config = AdvisorConfig::new(dir.path()).with_render_document(true);

    let outcome = AdvisoryOrchestrator::new(config, agent)
        .run_cycle()
        .await
        .unwrap();

    assert!(outcome.payload.detail.contains("file://"));
    let html = std::fs::read_to_string(dir.path().join("llm_suggestion.html")).unwrap();
    assert_eq!(html, "<html>report</html>");
}

#[tokio::test]
async fn integration_prompt_preview_does_not_call_agent() {
    let dir = workspace();
    let agent = Arc::new(ScriptedAgent::new());
    let prompt = orchestrator(dir.path(), agent.clone())
        .prompt_for(TaskKind::NewFeatureAdoption)
        .unwrap();

    assert!(prompt.starts_with(FEATURES));
    assert!(prompt.contains("- site level managed certificate"));
    assert!(prompt.contains("# incapsula_site_v3"));
    assert!(agent.prompts().is_empty());
}
