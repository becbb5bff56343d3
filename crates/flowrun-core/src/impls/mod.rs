//! Impls - ports の実装
//!
//! # 開発・テスト用
//! - **InMemoryDeliveryQueue**: Clock で可視性タイムアウトを再現する配送キュー
//! - **InMemoryStatusStore**: Status/Analysis Record
//! - **InMemoryArtifactStore**: Blob ストア
//!
//! # 本番用
//! - **PgmqDeliveryQueue**: pgmq（sqlx）
//! - **PostgresStatusStore**: `tests_runs` / `organizations_analyses`（sqlx）
//! - **LocalArtifactStore**: ローカルファイルシステム
//! - **HttpAgent**: エージェント sidecar（reqwest）

pub mod http_agent;
pub mod inmem_artifacts;
pub mod inmem_delivery;
pub mod inmem_status;
pub mod local_artifacts;
pub mod pg_status;
pub mod pgmq_delivery;

// 主要な型を再エクスポート
pub use self::http_agent::HttpAgent;
pub use self::inmem_artifacts::{InMemoryArtifactStore, StoredArtifact};
pub use self::inmem_delivery::InMemoryDeliveryQueue;
pub use self::inmem_status::InMemoryStatusStore;
pub use self::local_artifacts::LocalArtifactStore;
pub use self::pg_status::PostgresStatusStore;
pub use self::pgmq_delivery::PgmqDeliveryQueue;
