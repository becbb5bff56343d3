//! StatusStore port - Status Record / Analysis Record の永続化（PostgreSQL）
//!
//! 各操作は独立したトランザクションです。順序の保証はしません
//! （遷移の順序はディスパッチャが守る）。

use crate::domain::{OrganizationId, RunStatus, RunSummary, TestRunSlug, TestVersionSlug};

/// UpdateOutcome は条件付き status 更新の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// `previous` は更新前の status（未知の値なら `None`）
    Updated { previous: Option<RunStatus> },
    /// その slug の生きた行がない。run が削除された可能性があるだけで異常ではない
    NoMatchingRow,
}

/// InsertOutcome は重複ガード付き分析 insert の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// 同じ organization と URL の行が既にある
    AlreadyRecorded,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("status store unavailable: {0}")]
    Unavailable(String),
}

/// StatusStore は実行状態と分析結果を記録
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// `slug` の行に `status` を書き、`updated_at` を進める
    async fn update_status(
        &self,
        slug: &TestRunSlug,
        status: RunStatus,
    ) -> Result<UpdateOutcome, StoreError>;

    /// 同じ行がなければ Analysis Record を insert
    async fn insert_analysis(
        &self,
        organization_id: &OrganizationId,
        analysis_url: &str,
    ) -> Result<InsertOutcome, StoreError>;

    /// テストバージョンの直近に更新された `succeeded` の run
    async fn latest_successful_run(
        &self,
        version: &TestVersionSlug,
    ) -> Result<Option<RunSummary>, StoreError>;
}
