//! Task pipelines - `test-run` と `website-analysis` の処理手順
//!
//! test-run:
//!   running → エージェント → スクリーンショット → run.json → succeeded / failed
//!   エージェントまたは保存が失敗したら成果物の続きは書かず failed にしてエラーを返す
//!
//! website-analysis:
//!   エージェント → 分析ドキュメント → Analysis Record（状態遷移なし）

use tracing::{error, info};

use super::dispatcher::{TaskDispatcher, TaskReport};
use crate::domain::{AnalysisKey, AnalysisTask, RunStatus, RunSummary, TaskError, TestRunTask};
use crate::ports::{AgentTask, ArtifactKey, Delivery};

/// Separator between the analysis template and the domain.
const WEBSITE_HEADING: &str = " \n\n ## Website to Analyze \n ";

pub fn analysis_prompt(template: &str, domain: &str) -> String {
    format!("{template}{WEBSITE_HEADING}{domain}")
}

/// Append a pointer to a previous successful run of the same test.
///
/// Without a stored results location there is nothing useful to point at.
pub fn with_context_hint(task: &str, previous: &RunSummary) -> String {
    let Some(results_url) = previous.results_url.as_deref() else {
        return task.to_string();
    };
    let model = match (&previous.model_provider, &previous.model_slug) {
        (Some(provider), Some(slug)) => format!(" with {provider}/{slug}"),
        _ => String::new(),
    };
    format!(
        "{task}\n\n## Previous successful run\n\
         Run {slug}{model} completed this test on {date}. \
         Its recorded steps are stored at {results_url}; follow the same path when it still applies.",
        slug = previous.slug,
        date = previous.updated_at.format("%Y-%m-%d"),
    )
}

impl TaskDispatcher {
    pub(super) async fn run_test(&self, task: TestRunTask) -> Result<TaskReport, TaskError> {
        let slug = task.test_run_slug.clone();
        self.status.transition(&slug, RunStatus::Running).await;

        let prompt = self.test_prompt(&task).await;
        let agent_task = AgentTask::new(prompt, task.model(&self.settings.default_model));

        match self.execute_and_persist(&task, &agent_task).await {
            Ok((verdict, run_document)) => {
                self.status.transition(&slug, verdict).await;
                info!(slug = %slug, status = %verdict, "test run finished");
                Ok(TaskReport::TestRun {
                    slug,
                    status: verdict,
                    run_document,
                })
            }
            Err(err) => {
                error!(slug = %slug, kind = ?err.kind(), error = %err, "test run failed");
                self.status.transition(&slug, RunStatus::Failed).await;
                Err(err)
            }
        }
    }

    async fn execute_and_persist(
        &self,
        task: &TestRunTask,
        agent_task: &AgentTask,
    ) -> Result<(RunStatus, ArtifactKey), TaskError> {
        let result = self.run_agent(agent_task).await?;
        let run_document = self.artifacts.save_run(&task.test_run_slug, &result).await?;
        Ok((result.verdict(), run_document))
    }

    async fn test_prompt(&self, task: &TestRunTask) -> String {
        if !self.settings.context_injection {
            return task.task.clone();
        }
        let Some(version) = &task.test_version_slug else {
            return task.task.clone();
        };
        match self.status.latest_successful_run(version).await {
            Some(previous) => with_context_hint(&task.task, &previous),
            None => task.task.clone(),
        }
    }

    pub(super) async fn run_analysis(
        &self,
        task: AnalysisTask,
        delivery: &Delivery,
    ) -> Result<TaskReport, TaskError> {
        let prompt = analysis_prompt(&self.settings.analysis_template, &task.organization_domain);
        let agent_task = AgentTask::new(prompt, task.model(&self.settings.default_model));
        let result = self.run_agent(&agent_task).await?;

        let key = AnalysisKey::for_delivery(delivery.enqueued_at, delivery.receipt.as_i64());
        let document = self
            .artifacts
            .save_analysis(&task.organization_slug, key, &result)
            .await?;
        let recorded = self
            .status
            .record_analysis(&task.organization_id, document.as_str())
            .await;
        info!(
            organization = %task.organization_slug,
            document = %document,
            recorded,
            "website analysis finished"
        );

        Ok(TaskReport::Analysis {
            organization: task.organization_slug,
            document,
            recorded,
        })
    }
}
