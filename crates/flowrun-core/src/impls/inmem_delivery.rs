//! InMemoryDeliveryQueue - 開発・テスト用の配送キュー
//!
//! # 学習ポイント
//! - 可視性タイムアウトを Clock で再現（FixedClock で時間を進めて再配送を確認）
//! - receive は最も古い「見える」メッセージを 1 件だけ返す
//! - archive は削除ではなく dead-letter への移動

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::ports::{Clock, Delivery, DeliveryQueue, QueueError, Receipt};

struct StoredMessage {
    body: String,
    enqueued_at: DateTime<Utc>,
    read_count: i32,
    visible_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    /// Keyed by message id, so iteration order is enqueue order.
    messages: BTreeMap<i64, StoredMessage>,
    archived: Vec<(Receipt, String)>,
    next_id: i64,
}

/// InMemoryDeliveryQueue は開発用の配送キュー
///
/// # 使用例
/// ```ignore
/// let queue = InMemoryDeliveryQueue::new(Arc::new(SystemClock), Duration::seconds(960));
/// queue.send(r#"{"taskType":"test-run",...}"#).await;
/// let delivery = queue.receive().await?;
/// ```
pub struct InMemoryDeliveryQueue {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    visibility_timeout: Duration,
}

impl InMemoryDeliveryQueue {
    pub fn new(clock: Arc<dyn Clock>, visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            clock,
            visibility_timeout,
        }
    }

    /// メッセージを追加（すぐに見える）
    pub async fn send(&self, body: impl Into<String>) -> Receipt {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        state.messages.insert(
            id,
            StoredMessage {
                body: body.into(),
                enqueued_at: now,
                read_count: 0,
                visible_at: now,
            },
        );
        Receipt::new(id)
    }

    /// キューに残っているメッセージ数（処理中を含む）
    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, receipt: Receipt) -> bool {
        self.state
            .lock()
            .await
            .messages
            .contains_key(&receipt.as_i64())
    }

    /// archive されたメッセージ（古い順）
    pub async fn archived(&self) -> Vec<(Receipt, String)> {
        self.state.lock().await.archived.clone()
    }
}

#[async_trait::async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let Some((&id, message)) = state
            .messages
            .iter_mut()
            .find(|(_, message)| message.visible_at <= now)
        else {
            return Ok(None);
        };

        message.read_count += 1;
        message.visible_at = now + self.visibility_timeout;
        Ok(Some(Delivery {
            receipt: Receipt::new(id),
            body: message.body.clone(),
            read_count: message.read_count,
            enqueued_at: message.enqueued_at,
        }))
    }

    async fn delete(&self, receipt: Receipt) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .messages
            .remove(&receipt.as_i64())
            .map(|_| ())
            .ok_or(QueueError::UnknownReceipt(receipt))
    }

    async fn archive(&self, receipt: Receipt) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let message = state
            .messages
            .remove(&receipt.as_i64())
            .ok_or(QueueError::UnknownReceipt(receipt))?;
        state.archived.push((receipt, message.body));
        Ok(())
    }
}
