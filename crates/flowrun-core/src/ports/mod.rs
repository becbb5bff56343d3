//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（pgmq, PostgreSQL, Blob storage, エージェント）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - キューは at-least-once。削除は成功時のみ
//! - PostgreSQL が Status Record / Analysis Record の正本
//! - Blob storage はスクリーンショットと結果 JSON の保存先

pub mod agent;
pub mod artifact_store;
pub mod clock;
pub mod delivery_queue;
pub mod status_store;

// 主要な trait を再エクスポート
pub use self::agent::{AgentError, AgentTask, AutomationAgent};
pub use self::artifact_store::{ArtifactError, ArtifactKey, ArtifactStore, ContentType};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery_queue::{Delivery, DeliveryQueue, QueueError, Receipt};
pub use self::status_store::{InsertOutcome, StatusStore, StoreError, UpdateOutcome};
