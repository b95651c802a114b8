use serde::Serialize;
use std::fmt;

/// Lifecycle of a single crawl run
///
/// `Idle -> Running -> {Completed, Aborted}`. Both outcomes are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if the run may move from `self` to `next`
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborted)
        )
    }

    /// Database representation used in the `runs` table
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
