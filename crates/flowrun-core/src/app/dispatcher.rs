//! TaskDispatcher - メッセージ本文を解析してタスク種別ごとのパイプラインへ
//!
//! # フロー
//! 1. 本文を `TaskMessage` に解析（失敗は `TaskError::Malformed`、状態は変えない）
//! 2. `test-run` / `website-analysis` のパイプラインを実行（`pipeline.rs`）
//! 3. エージェント呼び出しは常に期限付き（`tokio::time::timeout`）

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::artifacts::ArtifactWriter;
use super::status::StatusRegister;
use crate::domain::{
    ModelChoice, OrganizationSlug, RunResult, RunStatus, TaskError, TaskMessage, TestRunSlug,
};
use crate::ports::{AgentTask, ArtifactKey, AutomationAgent, Delivery};

/// 組み込みのサイト分析テンプレート
pub const DEFAULT_ANALYSIS_TEMPLATE: &str = include_str!("../../prompts/analyze-website.md");

/// DispatchSettings はディスパッチャの設定（`WorkerConfig` から作る）
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// エージェント 1 回の実行時間の上限
    pub agent_timeout: Duration,
    /// メッセージに provider / model がないときに使う
    pub default_model: ModelChoice,
    pub analysis_template: String,
    /// 同じテストバージョンの直近の成功 run をタスクに添える
    pub context_injection: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(900),
            default_model: ModelChoice::default(),
            analysis_template: DEFAULT_ANALYSIS_TEMPLATE.to_string(),
            context_injection: false,
        }
    }
}

/// TaskReport は処理に成功したメッセージの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskReport {
    TestRun {
        slug: TestRunSlug,
        /// 書き込んだ終了 status（`succeeded` か `failed`）
        status: RunStatus,
        run_document: ArtifactKey,
    },
    Analysis {
        organization: OrganizationSlug,
        document: ArtifactKey,
        /// Analysis Record の存在を確認できたか
        recorded: bool,
    },
}

pub struct TaskDispatcher {
    pub(super) agent: Arc<dyn AutomationAgent>,
    pub(super) artifacts: ArtifactWriter,
    pub(super) status: StatusRegister,
    pub(super) settings: DispatchSettings,
}

impl TaskDispatcher {
    pub fn new(
        agent: Arc<dyn AutomationAgent>,
        artifacts: ArtifactWriter,
        status: StatusRegister,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            agent,
            artifacts,
            status,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// 配送されたメッセージを 1 件処理
    ///
    /// `Ok` なら削除してよい。`Err` はすべて再配送（または dead-letter）に任せる。
    pub async fn dispatch(&self, delivery: &Delivery) -> Result<TaskReport, TaskError> {
        let message = TaskMessage::parse(&delivery.body).map_err(TaskError::Malformed)?;
        info!(receipt = %delivery.receipt, kind = %message.kind(), "dispatching task");

        match message {
            TaskMessage::TestRun(task) => self.run_test(task).await,
            TaskMessage::WebsiteAnalysis(task) => self.run_analysis(task, delivery).await,
        }
    }

    /// 期限付きでエージェントを実行
    ///
    /// 期限切れで future を drop するので、実行は次の await 地点で止まります。
    pub(super) async fn run_agent(&self, task: &AgentTask) -> Result<RunResult, TaskError> {
        let deadline = self.settings.agent_timeout;
        match tokio::time::timeout(deadline, self.agent.run(task)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(?deadline, "agent run exceeded its deadline");
                Err(TaskError::DeadlineExceeded(deadline))
            }
        }
    }
}
