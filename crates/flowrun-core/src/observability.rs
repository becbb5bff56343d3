//! Observability - ワーカーの稼働状況の集計
//!
//! `WorkerLoop::run` がサイクルごとに記録し、終了時に返します。
//! ログは各所の `tracing` イベントで出します。

use serde::{Deserialize, Serialize};

use crate::app::worker_loop::CycleOutcome;
use crate::ports::QueueError;

/// WorkerStats は `WorkerLoop::run` 1 回分のサイクル集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub idle: u64,
    pub acknowledged: u64,
    pub redelivered: u64,
    pub dead_lettered: u64,
    pub transport_errors: u64,
}

impl WorkerStats {
    pub fn record(&mut self, cycle: &Result<CycleOutcome, QueueError>) {
        match cycle {
            Ok(CycleOutcome::Idle) => self.idle += 1,
            Ok(CycleOutcome::Acknowledged { .. }) => self.acknowledged += 1,
            Ok(CycleOutcome::Redelivered { .. }) => self.redelivered += 1,
            Ok(CycleOutcome::DeadLettered { .. }) => self.dead_lettered += 1,
            Err(_) => self.transport_errors += 1,
        }
    }

    /// メッセージを受け取ったサイクル数
    pub fn processed(&self) -> u64 {
        self.acknowledged + self.redelivered + self.dead_lettered
    }
}
