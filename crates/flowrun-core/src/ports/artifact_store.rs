//! ArtifactStore port - Blob ストレージ（Local/InMemory）
//!
//! スクリーンショットと結果 JSON をキー単位で保存します。
//! 同じキーへの put は上書き（再配送時に同じキーが再生成される）。

use std::fmt;

use bytes::Bytes;

/// Validated object key, e.g. `test-runs/abc123/run.json`.
///
/// Keys are relative: no leading `/`, no empty, `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn parse(key: impl Into<String>) -> Result<Self, ArtifactError> {
        let key = key.into();
        let valid = !key.is_empty()
            && !key.contains('\\')
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if valid {
            Ok(Self(key))
        } else {
            Err(ArtifactError::InvalidKey(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ContentType は成果物と一緒に記録する Content-Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Png,
    Json,
}

impl ContentType {
    pub fn as_mime(self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::Json => "application/json",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("invalid artifact key '{0}'")]
    InvalidKey(String),

    #[error("failed to write artifact {key}: {source}")]
    Io {
        key: ArtifactKey,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact backend error: {0}")]
    Backend(String),
}

/// ArtifactStore は成果物を Blob に保存
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// `key` に `bytes` を保存（既存のものは上書き）
    async fn put(
        &self,
        key: &ArtifactKey,
        bytes: Bytes,
        content_type: ContentType,
    ) -> Result<(), ArtifactError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn nested_keys_are_accepted() {
        let key = ArtifactKey::parse("test-runs/abc123/screenshots/1.png").unwrap();
        assert_eq!(key.segments().count(), 4);
    }

    #[rstest]
    #[case::empty("")]
    #[case::absolute("/etc/passwd")]
    #[case::parent("test-runs/../secrets")]
    #[case::trailing_slash("test-runs/")]
    #[case::double_slash("a//b")]
    #[case::backslash("a\\b")]
    fn escaping_keys_are_rejected(#[case] raw: &str) {
        assert!(matches!(
            ArtifactKey::parse(raw),
            Err(ArtifactError::InvalidKey(_))
        ));
    }
}
