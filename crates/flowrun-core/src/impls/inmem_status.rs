//! InMemoryStatusStore - 開発・テスト用の Status/Analysis ストア
//!
//! PostgresStatusStore と同じ意味論:
//! - 削除済み（deleted）の行は更新しない → NoMatchingRow
//! - 同じ (organization_id, analysis_url) の分析は二重に挿入しない

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::{OrganizationId, RunStatus, RunSummary, TestRunSlug, TestVersionSlug};
use crate::ports::{InsertOutcome, StatusStore, StoreError, UpdateOutcome};

struct RunRow {
    status: RunStatus,
    deleted: bool,
}

#[derive(Default)]
struct State {
    runs: HashMap<String, RunRow>,
    /// Every status write that hit a row, in order.
    writes: Vec<(String, RunStatus)>,
    analyses: Vec<(OrganizationId, String)>,
    latest_successful: HashMap<String, RunSummary>,
    unavailable: bool,
}

#[derive(Default)]
pub struct InMemoryStatusStore {
    state: Mutex<State>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// producer と同じように run の行を作る（あれば上書き）
    pub async fn seed_run(&self, slug: &TestRunSlug, status: RunStatus) {
        let mut state = self.state.lock().await;
        state.runs.insert(
            slug.to_string(),
            RunRow {
                status,
                deleted: false,
            },
        );
    }

    /// run の行を論理削除
    pub async fn delete_run(&self, slug: &TestRunSlug) {
        let mut state = self.state.lock().await;
        if let Some(row) = state.runs.get_mut(slug.as_str()) {
            row.deleted = true;
        }
    }

    pub async fn seed_successful_run(&self, version: &TestVersionSlug, summary: RunSummary) {
        let mut state = self.state.lock().await;
        state.latest_successful.insert(version.to_string(), summary);
    }

    /// すべての操作を `StoreError::Unavailable` で失敗させる
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    pub async fn status_of(&self, slug: &TestRunSlug) -> Option<RunStatus> {
        let state = self.state.lock().await;
        state.runs.get(slug.as_str()).map(|row| row.status)
    }

    /// `slug` に書かれた status（古い順）
    pub async fn history_of(&self, slug: &TestRunSlug) -> Vec<RunStatus> {
        let state = self.state.lock().await;
        state
            .writes
            .iter()
            .filter(|(written, _)| written == slug.as_str())
            .map(|(_, status)| *status)
            .collect()
    }

    pub async fn analyses(&self) -> Vec<(OrganizationId, String)> {
        self.state.lock().await.analyses.clone()
    }

    fn check_available(state: &State) -> Result<(), StoreError> {
        if state.unavailable {
            return Err(StoreError::Unavailable("in-memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn update_status(
        &self,
        slug: &TestRunSlug,
        status: RunStatus,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        Self::check_available(state)?;
        match state.runs.get_mut(slug.as_str()) {
            Some(row) if !row.deleted => {
                let previous = std::mem::replace(&mut row.status, status);
                state.writes.push((slug.to_string(), status));
                Ok(UpdateOutcome::Updated {
                    previous: Some(previous),
                })
            }
            _ => Ok(UpdateOutcome::NoMatchingRow),
        }
    }

    async fn insert_analysis(
        &self,
        organization_id: &OrganizationId,
        analysis_url: &str,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        Self::check_available(&state)?;
        let exists = state
            .analyses
            .iter()
            .any(|(id, url)| id == organization_id && url == analysis_url);
        if exists {
            return Ok(InsertOutcome::AlreadyRecorded);
        }
        state
            .analyses
            .push((organization_id.clone(), analysis_url.to_string()));
        Ok(InsertOutcome::Inserted)
    }

    async fn latest_successful_run(
        &self,
        version: &TestVersionSlug,
    ) -> Result<Option<RunSummary>, StoreError> {
        let state = self.state.lock().await;
        Self::check_available(&state)?;
        Ok(state.latest_successful.get(version.as_str()).cloned())
    }
}
