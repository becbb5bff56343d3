//! DeliveryQueue port - 配送キュー（pgmq または InMemory）
//!
//! at-least-once 配送: `receive` したメッセージは可視性タイムアウトの間だけ
//! 隠れ、`delete` されなければ再配送されます。

use std::fmt;

use chrono::{DateTime, Utc};

/// Receipt は配送 1 件分のハンドル（pgmq の `msg_id`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Receipt(i64);

impl Receipt {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery はキューから受け取ったメッセージ 1 件
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub receipt: Receipt,
    pub body: String,
    /// 今回を含めた受け取り回数
    pub read_count: i32,
    pub enqueued_at: DateTime<Utc>,
}

/// QueueError はキュー操作のエラー
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("pgmq error: {0}")]
    Pgmq(#[from] pgmq::errors::PgmqError),

    #[error("no in-flight message with receipt {0}")]
    UnknownReceipt(Receipt),

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

/// DeliveryQueue は Task Message を配送するキュー
///
/// # 設計原則
/// - 一度に最大 1 件だけ受け取る（ワーカーは同時に 1 タスクのみ）
/// - 削除は処理成功時のみ。失敗時は何もしない（可視性タイムアウトで再配送）
/// - archive は dead-letter 用。削除とは別物
#[async_trait::async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// 最大 1 件受け取り、可視性タイムアウトの間隠す
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    /// 処理済みメッセージを削除
    async fn delete(&self, receipt: Receipt) -> Result<(), QueueError>;

    /// メッセージを archive（dead-letter）テーブルへ移す
    async fn archive(&self, receipt: Receipt) -> Result<(), QueueError>;
}
