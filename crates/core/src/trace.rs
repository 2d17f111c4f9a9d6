use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TRACE_ID_MIN_LENGTH: usize = 8;
const TRACE_ID_MAX_LENGTH: usize = 128;

/// Correlation identifier carried through logs, audit events and error payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Mints a fresh random trace identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts an upstream trace identifier, minting a new one when the value
    /// is missing or does not match `[A-Za-z0-9_-]{8,128}`.
    #[must_use]
    pub fn from_upstream(value: Option<&str>) -> Self {
        value
            .map(str::trim)
            .filter(|value| is_acceptable(value))
            .map(|value| Self(value.to_owned()))
            .unwrap_or_default()
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TraceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

fn is_acceptable(value: &str) -> bool {
    (TRACE_ID_MIN_LENGTH..=TRACE_ID_MAX_LENGTH).contains(&value.len())
        && value
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '-' || character == '_')
}
