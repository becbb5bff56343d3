//! Domain model (slugs, task messages, run results, statuses, errors).
//!
//! 外部システムに依存しない値と判定ロジックだけを置きます。
//! - message: キューから届く Task Message
//! - run_result: エージェントの実行結果と verdict
//! - status: Status Record の状態機械
//! - analysis: Analysis Record のキー
//! - errors: ErrorKind による分類

pub mod analysis;
pub mod errors;
pub mod ids;
pub mod message;
pub mod model;
pub mod run_result;
pub mod status;

pub use self::analysis::{AnalysisKey, OrganizationId};
pub use self::errors::{ErrorKind, TaskError};
pub use self::ids::{OrganizationSlug, Slug, SlugError, TestRunSlug, TestVersionSlug};
pub use self::message::{AnalysisTask, TaskKind, TaskMessage, TestRunTask};
pub use self::model::{ModelChoice, ModelProvider, UnsupportedProvider};
pub use self::run_result::{
    ActionResult, AgentThought, Residue, RunResult, Screenshot, UsageSummary,
};
pub use self::status::{RunStatus, RunSummary};
