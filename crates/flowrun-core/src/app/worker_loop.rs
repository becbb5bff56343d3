//! WorkerLoop - キューからタスクを 1 件ずつ取り出して処理するループ
//!
//! # フロー（1 サイクル）
//! 1. DeliveryQueue::receive() で最大 1 件受け取る（なければ Idle）
//! 2. TaskDispatcher::dispatch() で処理
//! 3. 成功時のみ DeliveryQueue::delete()
//! 4. 失敗時は何もしない（可視性タイムアウト後に再配送）
//!    PoisonPolicy::Archive なら Permanent エラーは archive へ
//!
//! shutdown は新しいメッセージの受け取りを止めるだけで、処理中のタスクは
//! キャンセルしません。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::dispatcher::{TaskDispatcher, TaskReport};
use crate::domain::ErrorKind;
use crate::observability::WorkerStats;
use crate::ports::{DeliveryQueue, QueueError, Receipt};

/// PoisonPolicy は処理不能なメッセージの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PoisonPolicy {
    /// 他の失敗と同じく再配送に任せる
    #[default]
    Redeliver,
    /// `Permanent` な失敗はキューの archive へ移す
    Archive,
}

impl FromStr for PoisonPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redeliver" => Ok(PoisonPolicy::Redeliver),
            "archive" => Ok(PoisonPolicy::Archive),
            other => Err(format!("expected 'redeliver' or 'archive', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// shutdown までポーリングし続ける
    #[default]
    Forever,
    /// 最初に空振りした時点で終了
    UntilIdle,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forever" => Ok(RunMode::Forever),
            "until-idle" => Ok(RunMode::UntilIdle),
            other => Err(format!("expected 'forever' or 'until-idle', got '{other}'")),
        }
    }
}

/// CycleOutcome は `run_once` 1 回の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Idle,
    /// 処理して削除した
    Acknowledged { receipt: Receipt, report: TaskReport },
    /// 処理に失敗。メッセージはキューに残る
    Redelivered { receipt: Receipt, kind: ErrorKind },
    /// poison メッセージを archive に移した
    DeadLettered { receipt: Receipt },
}

/// WorkerLoop はタスクを 1 件ずつ実行
pub struct WorkerLoop {
    queue: Arc<dyn DeliveryQueue>,
    dispatcher: TaskDispatcher,
    poison_policy: PoisonPolicy,
    run_mode: RunMode,
    idle_delay: Duration,
}

impl WorkerLoop {
    pub fn new(
        queue: Arc<dyn DeliveryQueue>,
        dispatcher: TaskDispatcher,
        poison_policy: PoisonPolicy,
        run_mode: RunMode,
        idle_delay: Duration,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            poison_policy,
            run_mode,
            idle_delay,
        }
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    /// One receive → dispatch → acknowledge cycle.
    ///
    /// `Err` になるのはキュー操作（receive / delete / archive）の失敗だけ。
    pub async fn run_once(&self) -> Result<CycleOutcome, QueueError> {
        let Some(delivery) = self.queue.receive().await? else {
            return Ok(CycleOutcome::Idle);
        };
        let receipt = delivery.receipt;

        match self.dispatcher.dispatch(&delivery).await {
            Ok(report) => {
                self.queue.delete(receipt).await?;
                info!(receipt = %receipt, "message acknowledged");
                Ok(CycleOutcome::Acknowledged { receipt, report })
            }
            Err(err) if !err.is_retryable() && self.poison_policy == PoisonPolicy::Archive => {
                warn!(receipt = %receipt, error = %err, "archiving poison message");
                self.queue.archive(receipt).await?;
                Ok(CycleOutcome::DeadLettered { receipt })
            }
            Err(err) => {
                let kind = err.kind();
                error!(
                    receipt = %receipt,
                    read_count = delivery.read_count,
                    ?kind,
                    error = %err,
                    "task failed; leaving message for redelivery"
                );
                Ok(CycleOutcome::Redelivered { receipt, kind })
            }
        }
    }

    /// shutdown が要求されるまで `run_once` を繰り返す
    /// （`RunMode::UntilIdle` ならキューが空になった時点で終了）
    ///
    /// shutdown の送信側が drop されても止まります。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        info!(mode = ?self.run_mode, policy = ?self.poison_policy, "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let cycle = self.run_once().await;
            stats.record(&cycle);

            let pause = match &cycle {
                Ok(CycleOutcome::Idle) if self.run_mode == RunMode::UntilIdle => break,
                Ok(CycleOutcome::Idle) => true,
                Ok(_) => false,
                Err(err) => {
                    error!(error = %err, "queue operation failed");
                    true
                }
            };

            if pause {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(jittered(self.idle_delay)) => {}
                }
            }
        }

        info!(?stats, "worker stopped");
        stats
    }
}

/// `delay` plus up to 20% so that scaled-out workers drift apart.
fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0..=1.2);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::artifacts::ArtifactWriter;
    use crate::app::dispatcher::DispatchSettings;
    use crate::app::status::StatusRegister;
    use crate::domain::{RunStatus, TestRunSlug};
    use crate::impls::{InMemoryArtifactStore, InMemoryDeliveryQueue, InMemoryStatusStore};
    use crate::ports::FixedClock;
    use crate::testing::{ScriptedAgent, Step, fixed_clock, successful_run, test_run_body};
    use rstest::rstest;

    struct Harness {
        clock: Arc<FixedClock>,
        queue: Arc<InMemoryDeliveryQueue>,
        artifacts: Arc<InMemoryArtifactStore>,
        status: Arc<InMemoryStatusStore>,
        worker: WorkerLoop,
    }

    async fn harness(steps: Vec<Step>, policy: PoisonPolicy, mode: RunMode) -> Harness {
        let clock = fixed_clock();
        let queue = Arc::new(InMemoryDeliveryQueue::new(
            clock.clone(),
            chrono::Duration::seconds(960),
        ));
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let status = Arc::new(InMemoryStatusStore::new());
        status
            .seed_run(&TestRunSlug::parse("abc123").unwrap(), RunStatus::Pending)
            .await;
        let dispatcher = TaskDispatcher::new(
            ScriptedAgent::new(steps),
            ArtifactWriter::new(artifacts.clone()),
            StatusRegister::new(status.clone()),
            DispatchSettings::default(),
        );
        let worker = WorkerLoop::new(
            queue.clone(),
            dispatcher,
            policy,
            mode,
            Duration::from_millis(5),
        );
        Harness {
            clock,
            queue,
            artifacts,
            status,
            worker,
        }
    }

    fn slug() -> TestRunSlug {
        TestRunSlug::parse("abc123").unwrap()
    }

    #[tokio::test]
    async fn empty_queue_is_idle_without_side_effects() {
        let h = harness(vec![], PoisonPolicy::default(), RunMode::Forever).await;
        assert_eq!(h.worker.run_once().await.unwrap(), CycleOutcome::Idle);
        assert!(h.artifacts.keys().await.is_empty());
        assert!(h.status.history_of(&slug()).await.is_empty());
    }

    #[tokio::test]
    async fn success_deletes_the_message() {
        let h = harness(
            vec![Step::Return(successful_run(1))],
            PoisonPolicy::default(),
            RunMode::Forever,
        )
        .await;
        let receipt = h.queue.send(test_run_body("abc123")).await;

        let outcome = h.worker.run_once().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Acknowledged { receipt: r, .. } if r == receipt));
        assert!(h.queue.is_empty().await);
        assert_eq!(
            h.status.history_of(&slug()).await,
            vec![RunStatus::Running, RunStatus::Succeeded]
        );
        assert!(h.artifacts.get("test-runs/abc123/run.json").await.is_some());
    }

    #[tokio::test]
    async fn agent_error_leaves_message_for_redelivery() {
        let h = harness(
            vec![Step::Fail("agent crashed".into()), Step::Return(successful_run(1))],
            PoisonPolicy::default(),
            RunMode::Forever,
        )
        .await;
        let receipt = h.queue.send(test_run_body("abc123")).await;

        let outcome = h.worker.run_once().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Redelivered {
                receipt,
                kind: ErrorKind::Transient
            }
        );
        assert!(h.queue.contains(receipt).await);
        assert!(h.artifacts.get("test-runs/abc123/run.json").await.is_none());
        assert_eq!(
            h.status.history_of(&slug()).await,
            vec![RunStatus::Running, RunStatus::Failed]
        );

        // Hidden until the visibility timeout elapses, then redelivered.
        assert_eq!(h.worker.run_once().await.unwrap(), CycleOutcome::Idle);
        h.clock.advance(chrono::Duration::seconds(960));
        let retry = h.worker.run_once().await.unwrap();
        assert!(matches!(retry, CycleOutcome::Acknowledged { .. }));
        assert_eq!(h.status.status_of(&slug()).await, Some(RunStatus::Succeeded));
    }

    #[rstest]
    #[case::redeliver(PoisonPolicy::Redeliver)]
    #[case::archive(PoisonPolicy::Archive)]
    #[tokio::test]
    async fn malformed_message_is_never_deleted(#[case] policy: PoisonPolicy) {
        let h = harness(vec![], policy, RunMode::Forever).await;
        let receipt = h.queue.send("definitely not json").await;

        let outcome = h.worker.run_once().await.unwrap();

        match policy {
            PoisonPolicy::Redeliver => {
                assert_eq!(
                    outcome,
                    CycleOutcome::Redelivered {
                        receipt,
                        kind: ErrorKind::Permanent
                    }
                );
                assert!(h.queue.contains(receipt).await);
            }
            PoisonPolicy::Archive => {
                assert_eq!(outcome, CycleOutcome::DeadLettered { receipt });
                assert_eq!(
                    h.queue.archived().await,
                    vec![(receipt, "definitely not json".to_string())]
                );
            }
        }
        assert!(h.status.history_of(&slug()).await.is_empty());
    }

    #[tokio::test]
    async fn archive_policy_keeps_transient_failures_in_queue() {
        let h = harness(
            vec![Step::Fail("agent crashed".into())],
            PoisonPolicy::Archive,
            RunMode::Forever,
        )
        .await;
        let receipt = h.queue.send(test_run_body("abc123")).await;

        h.worker.run_once().await.unwrap();

        assert!(h.queue.contains(receipt).await);
        assert!(h.queue.archived().await.is_empty());
    }

    #[tokio::test]
    async fn until_idle_drains_the_queue_and_stops() {
        let h = harness(vec![], PoisonPolicy::default(), RunMode::UntilIdle).await;
        h.queue.send(test_run_body("abc123")).await;
        h.queue.send("garbage").await;
        let (_tx, rx) = watch::channel(false);

        let stats = h.worker.run(rx).await;

        assert_eq!(
            stats,
            WorkerStats {
                idle: 1,
                acknowledged: 1,
                redelivered: 1,
                ..WorkerStats::default()
            }
        );
        assert_eq!(stats.processed(), 2);
    }

    #[tokio::test]
    async fn shutdown_stops_a_polling_worker() {
        let h = harness(vec![], PoisonPolicy::default(), RunMode::Forever).await;
        let (tx, rx) = watch::channel(false);
        let worker = h.worker;

        let handle = tokio::spawn(async move { worker.run(rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(stats.idle >= 1);
        assert_eq!(stats.processed(), 0);
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        let base = Duration::from_secs(10);
        for _ in 0..100 {
            let delay = jittered(base);
            assert!(delay >= base && delay <= Duration::from_secs(12));
        }
    }

    #[rstest]
    #[case("redeliver", PoisonPolicy::Redeliver)]
    #[case("ARCHIVE", PoisonPolicy::Archive)]
    fn poison_policy_parses(#[case] raw: &str, #[case] expected: PoisonPolicy) {
        assert_eq!(raw.parse::<PoisonPolicy>().unwrap(), expected);
    }

    #[test]
    fn run_mode_parses() {
        assert_eq!("until-idle".parse::<RunMode>().unwrap(), RunMode::UntilIdle);
        assert!("sometimes".parse::<RunMode>().is_err());
    }
}
