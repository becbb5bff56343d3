//! Errors - タスク処理エラーと分類
//!
//! ワーカーループは `ErrorKind` を見てメッセージの扱いを決めます。
//! どの種類でもメッセージは削除されません（再配送 or アーカイブ）。

use std::time::Duration;

use crate::ports::{AgentError, ArtifactError};

/// ErrorKind は処理エラーの運用上の分類
///
/// - Transient: 一時的なエラー（再配送で回復し得る）
/// - Permanent: 恒久的なエラー（何度配送しても同じ結果）
/// - Infrastructure: 外部ストア・キューの障害
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Error raised while processing one delivered task message.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The body is not a valid task message (bad JSON, unknown `taskType`,
    /// missing field, invalid slug).
    #[error("malformed task message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("agent run failed: {0}")]
    Agent(#[from] AgentError),

    #[error("agent run exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("artifact write failed: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("result document could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Malformed(_) => ErrorKind::Permanent,
            TaskError::Agent(_) | TaskError::DeadlineExceeded(_) => ErrorKind::Transient,
            TaskError::Artifact(_) | TaskError::Encode(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether redelivering the same message can possibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Permanent
    }
}
