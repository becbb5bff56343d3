//! Artifact Store Client - キー配置と書き込み順序
//!
//! - `test-runs/{slug}/screenshots/{n}.png`（1 始まり、撮影順）
//! - `test-runs/{slug}/run.json`
//! - `organizations/{slug}/analysis/{key}.json`
//!
//! スクリーンショットを先に書き、run.json は最後に書きます。
//! run.json が存在すれば参照先の画像も揃っています。

use std::sync::Arc;

use tracing::debug;

use crate::codec::{self, AnalysisDocument, RunDocument, ScreenshotRef};
use crate::domain::{AnalysisKey, OrganizationSlug, RunResult, TaskError, TestRunSlug};
use crate::ports::{ArtifactError, ArtifactKey, ArtifactStore, ContentType};

/// キーの組み立てだけ（I/O なし）
pub struct ArtifactLayout;

impl ArtifactLayout {
    pub fn screenshot(slug: &TestRunSlug, index: usize) -> Result<ArtifactKey, ArtifactError> {
        ArtifactKey::parse(format!("test-runs/{slug}/screenshots/{index}.png"))
    }

    pub fn run_document(slug: &TestRunSlug) -> Result<ArtifactKey, ArtifactError> {
        ArtifactKey::parse(format!("test-runs/{slug}/run.json"))
    }

    pub fn analysis_document(
        organization: &OrganizationSlug,
        key: AnalysisKey,
    ) -> Result<ArtifactKey, ArtifactError> {
        ArtifactKey::parse(format!("organizations/{organization}/analysis/{key}.json"))
    }
}

/// ArtifactWriter は `ArtifactStore` 経由で run / 分析の成果物を書く
#[derive(Clone)]
pub struct ArtifactWriter {
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactWriter {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// スクリーンショットを撮影順に保存し、最後に `run.json`
    ///
    /// `run.json` のキーを返す。最初の書き込み失敗で止まる。
    pub async fn save_run(
        &self,
        slug: &TestRunSlug,
        result: &RunResult,
    ) -> Result<ArtifactKey, TaskError> {
        let mut screenshots = Vec::with_capacity(result.screenshots.len());
        for (offset, screenshot) in result.screenshots.iter().enumerate() {
            let id = offset + 1;
            let key = ArtifactLayout::screenshot(slug, id)?;
            self.store
                .put(&key, screenshot.bytes().clone(), ContentType::Png)
                .await?;
            screenshots.push(ScreenshotRef {
                id,
                path: key.as_str().to_string(),
            });
        }
        debug!(slug = %slug, count = screenshots.len(), "screenshots stored");

        let document = RunDocument::new(result, &screenshots);
        let bytes = codec::encode(&document).map_err(TaskError::Encode)?;
        let key = ArtifactLayout::run_document(slug)?;
        self.store.put(&key, bytes, ContentType::Json).await?;
        debug!(slug = %slug, key = %key, "run document stored");
        Ok(key)
    }

    /// 分析ドキュメントを保存してキーを返す
    pub async fn save_analysis(
        &self,
        organization: &OrganizationSlug,
        key: AnalysisKey,
        result: &RunResult,
    ) -> Result<ArtifactKey, TaskError> {
        let bytes = codec::encode(&AnalysisDocument::new(result)).map_err(TaskError::Encode)?;
        let key = ArtifactLayout::analysis_document(organization, key)?;
        self.store.put(&key, bytes, ContentType::Json).await?;
        debug!(organization = %organization, key = %key, "analysis document stored");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Screenshot;
    use crate::impls::InMemoryArtifactStore;
    use chrono::{TimeZone, Utc};

    fn slug() -> TestRunSlug {
        TestRunSlug::parse("abc123").unwrap()
    }

    #[test]
    fn keys_follow_the_layout() {
        assert_eq!(
            ArtifactLayout::screenshot(&slug(), 2).unwrap().as_str(),
            "test-runs/abc123/screenshots/2.png"
        );
        assert_eq!(
            ArtifactLayout::run_document(&slug()).unwrap().as_str(),
            "test-runs/abc123/run.json"
        );

        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let key = AnalysisKey::for_delivery(at, 5);
        let organization = OrganizationSlug::parse("acme").unwrap();
        assert_eq!(
            ArtifactLayout::analysis_document(&organization, key)
                .unwrap()
                .as_str(),
            format!("organizations/acme/analysis/{key}.json")
        );
    }

    #[tokio::test]
    async fn screenshots_are_numbered_in_capture_order() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let writer = ArtifactWriter::new(store.clone());
        let result = RunResult {
            is_done: true,
            screenshots: vec![
                Screenshot::new(&b"first"[..]),
                Screenshot::new(&b"second"[..]),
                Screenshot::new(&b"third"[..]),
            ],
            ..RunResult::default()
        };

        writer.save_run(&slug(), &result).await.unwrap();

        let expected: [&[u8]; 3] = [b"first", b"second", b"third"];
        for (index, expected) in expected.into_iter().enumerate() {
            let key = format!("test-runs/abc123/screenshots/{}.png", index + 1);
            let stored = store.get(&key).await.unwrap();
            assert_eq!(stored.bytes.as_ref(), expected);
            assert_eq!(stored.content_type, ContentType::Png);
        }
        let order = store.write_order().await;
        assert_eq!(order.last().unwrap(), "test-runs/abc123/run.json");
        assert_eq!(order.len(), 4);
    }

    #[tokio::test]
    async fn rewriting_the_same_run_overwrites_in_place() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let writer = ArtifactWriter::new(store.clone());
        let result = RunResult {
            is_done: true,
            screenshots: vec![Screenshot::new(&b"png"[..])],
            ..RunResult::default()
        };

        writer.save_run(&slug(), &result).await.unwrap();
        writer.save_run(&slug(), &result).await.unwrap();

        assert_eq!(store.keys().await.len(), 2);
    }
}
