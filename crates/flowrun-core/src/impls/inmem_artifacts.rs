//! InMemoryArtifactStore - テスト用の Blob ストア

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::ports::{ArtifactError, ArtifactKey, ArtifactStore, ContentType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub bytes: Bytes,
    pub content_type: ContentType,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, StoredArtifact>,
    /// Keys in the order they were written (repeats included).
    writes: Vec<String>,
    /// Fail any put whose key ends with this suffix.
    fail_suffix: Option<String>,
}

#[derive(Default)]
pub struct InMemoryArtifactStore {
    state: Mutex<State>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `suffix` で終わるキーへの put を失敗させる（例: `"run.json"`）
    pub async fn fail_writes_ending_with(&self, suffix: impl Into<String>) {
        self.state.lock().await.fail_suffix = Some(suffix.into());
    }

    pub async fn get(&self, key: &str) -> Option<StoredArtifact> {
        self.state.lock().await.objects.get(key).cloned()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut keys: Vec<String> = state.objects.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn write_order(&self) -> Vec<String> {
        self.state.lock().await.writes.clone()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: Bytes,
        content_type: ContentType,
    ) -> Result<(), ArtifactError> {
        let mut state = self.state.lock().await;
        if let Some(suffix) = &state.fail_suffix
            && key.as_str().ends_with(suffix.as_str())
        {
            return Err(ArtifactError::Backend(format!("injected failure for {key}")));
        }
        state.writes.push(key.to_string());
        state.objects.insert(
            key.to_string(),
            StoredArtifact {
                bytes,
                content_type,
            },
        );
        Ok(())
    }
}
