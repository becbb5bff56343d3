//! WorkerBuilder - ワーカーの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: ポートが欠けていれば build() で失敗
//! - エージェントは明示的に注入（プロセス全体のシングルトンにしない）

use std::sync::Arc;
use std::time::Duration;

use super::artifacts::ArtifactWriter;
use super::dispatcher::{DispatchSettings, TaskDispatcher};
use super::status::StatusRegister;
use super::worker_loop::{PoisonPolicy, RunMode, WorkerLoop};
use crate::ports::{ArtifactStore, AutomationAgent, DeliveryQueue, StatusStore};

/// WorkerBuilder は WorkerLoop を構築
///
/// # 使用例
/// ```ignore
/// let worker = WorkerBuilder::new()
///     .queue(Arc::new(queue))
///     .agent(Arc::new(HttpAgent::new(&config.agent_url)))
///     .artifacts(Arc::new(LocalArtifactStore::new(&config.artifact_root)))
///     .status(Arc::new(PostgresStatusStore::new(pool)))
///     .build()?;
/// ```
pub struct WorkerBuilder {
    queue: Option<Arc<dyn DeliveryQueue>>,
    agent: Option<Arc<dyn AutomationAgent>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    status: Option<Arc<dyn StatusStore>>,
    settings: DispatchSettings,
    poison_policy: PoisonPolicy,
    run_mode: RunMode,
    idle_delay: Duration,
}

/// BuildError はワーカー構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing ports: {0:?}. These ports must be provided before build().")]
    MissingPorts(Vec<&'static str>),
}

impl WorkerBuilder {
    pub fn new() -> Self {
        Self {
            queue: None,
            agent: None,
            artifacts: None,
            status: None,
            settings: DispatchSettings::default(),
            poison_policy: PoisonPolicy::default(),
            run_mode: RunMode::default(),
            idle_delay: Duration::from_secs(10),
        }
    }

    pub fn queue(mut self, queue: Arc<dyn DeliveryQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn agent(mut self, agent: Arc<dyn AutomationAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn status(mut self, status: Arc<dyn StatusStore>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn poison_policy(mut self, policy: PoisonPolicy) -> Self {
        self.poison_policy = policy;
        self
    }

    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    pub fn idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// # 検証
    /// - queue / agent / artifacts / status の 4 ポートが揃っているかチェック
    /// - 不足があれば BuildError::MissingPorts に全部まとめて返す
    pub fn build(self) -> Result<WorkerLoop, BuildError> {
        let missing: Vec<&'static str> = [
            ("queue", self.queue.is_none()),
            ("agent", self.agent.is_none()),
            ("artifacts", self.artifacts.is_none()),
            ("status", self.status.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(queue), Some(agent), Some(artifacts), Some(status)) =
            (self.queue, self.agent, self.artifacts, self.status)
        else {
            return Err(BuildError::MissingPorts(missing));
        };

        let dispatcher = TaskDispatcher::new(
            agent,
            ArtifactWriter::new(artifacts),
            StatusRegister::new(status),
            self.settings,
        );
        Ok(WorkerLoop::new(
            queue,
            dispatcher,
            self.poison_policy,
            self.run_mode,
            self.idle_delay,
        ))
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
