//! flowrun-core
//!
//! Core building blocks of the flowrun worker: it pulls browser-automation
//! tasks off a queue, runs them through an automation agent and records the
//! outcome.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（slug, Task Message, Run Result, Status, errors）
//! - **ports**: 抽象化レイヤー（DeliveryQueue, ArtifactStore, StatusStore, AutomationAgent, Clock）
//! - **app**: アプリケーションロジック（builder, worker_loop, dispatcher, pipeline）
//! - **codec**: Run Result → JSON ドキュメント
//! - **impls**: 実装（InMemory / pgmq / PostgreSQL / Local / HTTP）
//! - **config**: `FLOWRUN_*` 環境変数
//! - **observability**: WorkerStats

pub mod app;
pub mod codec;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

#[cfg(test)]
mod testing;

pub use self::app::{WorkerBuilder, WorkerLoop};
pub use self::config::{ConfigError, WorkerConfig};
pub use self::observability::WorkerStats;
