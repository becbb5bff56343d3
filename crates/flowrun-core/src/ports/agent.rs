//! AutomationAgent port - ブラウザ自動化エージェント
//!
//! エージェント本体は外部の能力です。ここでは呼び出し境界だけを定義します。
//! 内部でのリトライはしません（再試行は再配送に任せる）。

use serde::Serialize;

use crate::domain::{ModelChoice, ModelProvider, RunResult, UnsupportedProvider};

/// AgentTask はエージェント 1 回分の入力
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub task: String,
    pub model_provider: String,
    pub model_slug: String,
}

impl AgentTask {
    pub fn new(task: impl Into<String>, model: ModelChoice) -> Self {
        Self {
            task: task.into(),
            model_provider: model.provider,
            model_slug: model.slug,
        }
    }

    /// 要求された provider を対応表から引く
    pub fn provider(&self) -> Result<ModelProvider, AgentError> {
        Ok(self.model_provider.parse::<ModelProvider>()?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    UnsupportedProvider(#[from] UnsupportedProvider),

    #[error("agent transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("agent rejected the run with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("agent response could not be decoded: {0}")]
    Decode(String),

    #[error("agent run failed: {0}")]
    Run(String),
}

/// AutomationAgent はタスクを実行して RunResult を返す
#[async_trait::async_trait]
pub trait AutomationAgent: Send + Sync {
    async fn run(&self, task: &AgentTask) -> Result<RunResult, AgentError>;
}
