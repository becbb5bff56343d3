//! Status convenience layer - StatusStore の結果を bool に畳み込む
//!
//! ストアのエラーはここでログに出して `false` を返します。
//! ここより上にストアのエラーは伝播しません。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::domain::{OrganizationId, RunStatus, RunSummary, TestRunSlug, TestVersionSlug};
use crate::ports::{InsertOutcome, StatusStore, UpdateOutcome};

#[derive(Clone)]
pub struct StatusRegister {
    store: Arc<dyn StatusStore>,
}

impl StatusRegister {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// `slug` の status を書く。行を更新できたときだけ `true`
    pub async fn transition(&self, slug: &TestRunSlug, status: RunStatus) -> bool {
        match self.store.update_status(slug, status).await {
            Ok(UpdateOutcome::Updated { previous }) => {
                match check_transition(previous, status) {
                    TransitionCheck::Expected => {}
                    TransitionCheck::Rerun => {
                        info!(slug = %slug, previous = ?previous, "re-running a finished test run");
                    }
                    TransitionCheck::Unexpected => {
                        warn!(slug = %slug, previous = ?previous, status = %status, "unexpected status transition");
                    }
                }
                info!(slug = %slug, status = %status, "test run status updated");
                true
            }
            Ok(UpdateOutcome::NoMatchingRow) => {
                warn!(slug = %slug, status = %status, "no live test run with this slug");
                false
            }
            Err(err) => {
                error!(slug = %slug, status = %status, error = %err, "failed to update test run status");
                false
            }
        }
    }

    /// 分析の完了を記録。既に行があれば記録済みとみなす
    pub async fn record_analysis(&self, organization_id: &OrganizationId, analysis_url: &str) -> bool {
        match self.store.insert_analysis(organization_id, analysis_url).await {
            Ok(InsertOutcome::Inserted) => {
                info!(organization_id = %organization_id, analysis_url, "analysis recorded");
                true
            }
            Ok(InsertOutcome::AlreadyRecorded) => {
                info!(organization_id = %organization_id, analysis_url, "analysis was already recorded");
                true
            }
            Err(err) => {
                error!(organization_id = %organization_id, analysis_url, error = %err, "failed to record analysis");
                false
            }
        }
    }

    /// `version` の直近の成功 run。無い・取得失敗なら `None`
    pub async fn latest_successful_run(&self, version: &TestVersionSlug) -> Option<RunSummary> {
        match self.store.latest_successful_run(version).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(version = %version, error = %err, "prior run lookup failed");
                None
            }
        }
    }
}

/// 更新前の status から見た遷移の分類（ストアは順序を強制しないのでログ用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionCheck {
    Expected,
    /// 終了済みの run に再配送で戻ってきた
    Rerun,
    Unexpected,
}

fn check_transition(previous: Option<RunStatus>, next: RunStatus) -> TransitionCheck {
    match previous {
        None => TransitionCheck::Expected,
        Some(previous) if !previous.can_transition_to(next) => TransitionCheck::Unexpected,
        Some(previous) if previous.is_terminal() => TransitionCheck::Rerun,
        Some(_) => TransitionCheck::Expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStatusStore;
    use rstest::rstest;

    #[rstest]
    #[case::first_start(Some(RunStatus::Pending), RunStatus::Running, TransitionCheck::Expected)]
    #[case::finish(Some(RunStatus::Running), RunStatus::Succeeded, TransitionCheck::Expected)]
    #[case::worker_restart(Some(RunStatus::Running), RunStatus::Running, TransitionCheck::Expected)]
    #[case::redelivered(Some(RunStatus::Failed), RunStatus::Running, TransitionCheck::Rerun)]
    #[case::skipped_running(Some(RunStatus::Pending), RunStatus::Failed, TransitionCheck::Unexpected)]
    #[case::terminal_to_terminal(Some(RunStatus::Succeeded), RunStatus::Failed, TransitionCheck::Unexpected)]
    #[case::unknown_previous(None, RunStatus::Succeeded, TransitionCheck::Expected)]
    fn transitions_are_classified(
        #[case] previous: Option<RunStatus>,
        #[case] next: RunStatus,
        #[case] expected: TransitionCheck,
    ) {
        assert_eq!(check_transition(previous, next), expected);
    }

    #[tokio::test]
    async fn unexpected_transition_is_still_written() {
        let store = Arc::new(InMemoryStatusStore::new());
        store.seed_run(&slug(), RunStatus::Pending).await;
        let register = StatusRegister::new(store.clone());

        assert!(register.transition(&slug(), RunStatus::Succeeded).await);
        assert_eq!(store.status_of(&slug()).await, Some(RunStatus::Succeeded));
    }

    fn slug() -> TestRunSlug {
        TestRunSlug::parse("abc123").unwrap()
    }

    #[tokio::test]
    async fn transition_reports_whether_a_row_changed() {
        let store = Arc::new(InMemoryStatusStore::new());
        store.seed_run(&slug(), RunStatus::Pending).await;
        let register = StatusRegister::new(store.clone());

        assert!(register.transition(&slug(), RunStatus::Running).await);
        assert_eq!(store.status_of(&slug()).await, Some(RunStatus::Running));

        let missing = TestRunSlug::parse("ghost").unwrap();
        assert!(!register.transition(&missing, RunStatus::Running).await);
    }

    #[tokio::test]
    async fn store_failures_become_false() {
        let store = Arc::new(InMemoryStatusStore::new());
        store.seed_run(&slug(), RunStatus::Pending).await;
        store.set_unavailable(true).await;
        let register = StatusRegister::new(store.clone());

        assert!(!register.transition(&slug(), RunStatus::Running).await);
        assert!(
            !register
                .record_analysis(&OrganizationId::Numeric(1), "organizations/a/analysis/x.json")
                .await
        );
        assert_eq!(store.status_of(&slug()).await, Some(RunStatus::Pending));
    }

    #[tokio::test]
    async fn duplicate_analysis_is_still_recorded() {
        let store = Arc::new(InMemoryStatusStore::new());
        let register = StatusRegister::new(store.clone());
        let id = OrganizationId::Numeric(7);

        assert!(register.record_analysis(&id, "organizations/acme/analysis/k.json").await);
        assert!(register.record_analysis(&id, "organizations/acme/analysis/k.json").await);
        assert_eq!(store.analyses().await.len(), 1);
    }
}
