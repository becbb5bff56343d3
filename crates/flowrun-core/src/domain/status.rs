//! Status Record state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TestRunSlug;

/// Status of a test run.
///
/// State transitions (driven by the dispatcher, not enforced by the store):
/// - Pending -> Running -> Succeeded
/// - Pending -> Running -> Failed
///
/// `Pending` is written by the producer when it creates the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// Column value in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Whether `self -> next` is a step of a well-behaved run.
    ///
    /// Re-entering `Running` from a terminal state is allowed: that is what a
    /// redelivered message does.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        match next {
            RunStatus::Pending => false,
            RunStatus::Running => true,
            RunStatus::Succeeded | RunStatus::Failed => self == RunStatus::Running,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Latest successful run of a test version (context lookup).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub slug: TestRunSlug,
    pub results_url: Option<String>,
    pub model_slug: Option<String>,
    pub model_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
