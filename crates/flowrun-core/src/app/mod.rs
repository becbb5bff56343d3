//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **WorkerBuilder**: ワーカーの構築とワイヤリング
//! - **WorkerLoop**: receive → dispatch → delete のループ
//! - **TaskDispatcher**: タスク種別ごとのパイプライン
//! - **ArtifactWriter**: 成果物のキー配置と書き込み順序
//! - **StatusRegister**: Status Store の結果を bool に畳み込む

pub mod artifacts;
pub mod builder;
pub mod dispatcher;
pub mod pipeline;
pub mod status;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::artifacts::{ArtifactLayout, ArtifactWriter};
pub use self::builder::{BuildError, WorkerBuilder};
pub use self::dispatcher::{DispatchSettings, TaskDispatcher, TaskReport};
pub use self::status::StatusRegister;
pub use self::worker_loop::{CycleOutcome, PoisonPolicy, RunMode, WorkerLoop};
