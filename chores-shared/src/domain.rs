use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often a routine blueprint produces a routine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recurrence {
    Daily,
    Weekly,
    Weekday,
}

impl Recurrence {
    pub const ALL: [Recurrence; 3] = [Recurrence::Daily, Recurrence::Weekly, Recurrence::Weekday];

    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::Weekday => "Weekday",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown recurrence: {0:?}")]
pub struct UnknownRecurrence(pub String);

impl FromStr for Recurrence {
    type Err = UnknownRecurrence;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Recurrence::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRecurrence(s.to_string()))
    }
}

/// Where a displayable routine came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A persisted routine instance.
    Database,
    /// Synthesized from a blueprint that has no instance yet.
    Blueprint,
}
