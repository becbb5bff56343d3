//! LocalArtifactStore - ローカルファイルシステムの Blob ストア
//!
//! キーはルートからの相対パスにそのまま対応します（`a/b/c.png` → `{root}/a/b/c.png`）。
//! 一時ファイルに書いてから rename するので、途中まで書かれたファイルは見えません。

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::instrument;

use crate::ports::{ArtifactError, ArtifactKey, ArtifactStore, ContentType};

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key`.
    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        key.segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for LocalArtifactStore {
    #[instrument(skip_all, fields(key = %key, content_type = %content_type, size = bytes.len()))]
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: Bytes,
        content_type: ContentType,
    ) -> Result<(), ArtifactError> {
        let io_error = |source| ArtifactError::Io {
            key: key.clone(),
            source,
        };

        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut staging = path.clone().into_os_string();
        staging.push(".partial");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, &bytes).await.map_err(io_error)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let key = ArtifactKey::parse("test-runs/abc123/run.json").unwrap();

        store
            .put(&key, Bytes::from_static(b"{\"v\":1}"), ContentType::Json)
            .await
            .unwrap();
        store
            .put(&key, Bytes::from_static(b"{\"v\":2}"), ContentType::Json)
            .await
            .unwrap();

        let path = dir.path().join("test-runs").join("abc123").join("run.json");
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"v\":2}");
        assert!(!dir.path().join("test-runs/abc123/run.json.partial").exists());
    }

    #[tokio::test]
    async fn unwritable_root_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let store = LocalArtifactStore::new(&blocker);
        let key = ArtifactKey::parse("test-runs/x/run.json").unwrap();

        let err = store
            .put(&key, Bytes::from_static(b"{}"), ContentType::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
