//! PgmqDeliveryQueue - pgmq（PostgreSQL 上のメッセージキュー）実装
//!
//! pgmq-rs の `PGMQueue` を共有プールの上に作ります:
//! - `read(queue, vt)`: 1 件受け取り、vt 秒間隠す
//! - `delete(queue, msg_id)`: 処理完了
//! - `archive(queue, msg_id)`: dead-letter（`pgmq.a_{queue}`）へ移動

use std::time::Duration;

use pgmq::PGMQueue;
use pgmq::types::Message;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::ports::{Delivery, DeliveryQueue, QueueError, Receipt};

#[derive(Debug, Clone)]
pub struct PgmqDeliveryQueue {
    pgmq: PGMQueue,
    queue_name: String,
    visibility_timeout: Duration,
}

impl PgmqDeliveryQueue {
    /// 既存のプールを pgmq と共有する（接続を二重に持たない）
    pub async fn new(
        pool: PgPool,
        queue_name: impl Into<String>,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            pgmq: PGMQueue::new_with_pool(pool).await,
            queue_name: queue_name.into(),
            visibility_timeout,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn visibility_secs(&self) -> i32 {
        visibility_secs(self.visibility_timeout)
    }
}

fn visibility_secs(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX)
}

/// pgmq のメッセージを Delivery に変換（本文は JSON テキストのまま渡す）
fn delivery_from_message(message: Message<Value>) -> Delivery {
    Delivery {
        receipt: Receipt::new(message.msg_id),
        body: message.message.to_string(),
        read_count: message.read_ct,
        enqueued_at: message.enqueued_at,
    }
}

fn acknowledged(receipt: Receipt, rows: u64) -> Result<(), QueueError> {
    if rows == 0 {
        Err(QueueError::UnknownReceipt(receipt))
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeliveryQueue for PgmqDeliveryQueue {
    #[instrument(skip(self), fields(queue = %self.queue_name))]
    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let message = self
            .pgmq
            .read::<Value>(&self.queue_name, Some(self.visibility_secs()))
            .await?;

        let Some(message) = message else {
            return Ok(None);
        };
        let delivery = delivery_from_message(message);
        debug!(receipt = %delivery.receipt, read_count = delivery.read_count, "message received");
        Ok(Some(delivery))
    }

    #[instrument(skip(self), fields(queue = %self.queue_name))]
    async fn delete(&self, receipt: Receipt) -> Result<(), QueueError> {
        let rows = self.pgmq.delete(&self.queue_name, receipt.as_i64()).await?;
        acknowledged(receipt, rows)
    }

    #[instrument(skip(self), fields(queue = %self.queue_name))]
    async fn archive(&self, receipt: Receipt) -> Result<(), QueueError> {
        let rows = self.pgmq.archive(&self.queue_name, receipt.as_i64()).await?;
        acknowledged(receipt, rows)
    }
}
