//! Analysis Record identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Organization primary key as sent by the producer (a JSON number or string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrganizationId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganizationId::Numeric(id) => write!(f, "{id}"),
            OrganizationId::Text(id) => f.write_str(id),
        }
    }
}

/// Collision-resistant suffix of an analysis document key.
///
/// Built from the delivery's enqueue time and transport message id, so the
/// same message always maps to the same key, even when it is redelivered.
/// The time prefix keeps keys sortable by submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnalysisKey(Ulid);

impl AnalysisKey {
    pub fn for_delivery(enqueued_at: DateTime<Utc>, message_id: i64) -> Self {
        let timestamp_ms = enqueued_at.timestamp_millis().max(0) as u64;
        Self(Ulid::from_parts(timestamp_ms, message_id as u64 as u128))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
