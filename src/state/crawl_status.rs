/// Crawl run status definitions
///
/// This module defines the lifecycle states of a crawl run and the legal
/// transitions between them.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    /// No run has been started on this stats instance
    #[default]
    Idle,

    /// Discovery and dispatch are active
    Running,

    /// No new tasks are admitted; in-flight tasks keep running
    Paused,

    // ===== Terminal States =====
    /// The run completed or was stopped; `end_time` is set
    Stopped,

    /// The run hit an unrecoverable condition
    Error,
}

impl CrawlStatus {
    /// Returns true once the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    /// Returns true while a run owns this stats instance
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true if `self -> to` is a legal transition
    ///
    /// ```text
    /// idle    -> running
    /// running -> paused | stopped | error
    /// paused  -> running | stopped | error
    /// ```
    pub fn can_transition_to(&self, to: CrawlStatus) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running | Self::Paused, Self::Stopped)
                | (Self::Running | Self::Paused, Self::Error)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all statuses
    pub fn all() -> [Self; 5] {
        [
            Self::Idle,
            Self::Running,
            Self::Paused,
            Self::Stopped,
            Self::Error,
        ]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!CrawlStatus::Idle.is_terminal());
        assert!(!CrawlStatus::Running.is_terminal());
        assert!(!CrawlStatus::Paused.is_terminal());
        assert!(CrawlStatus::Stopped.is_terminal());
        assert!(CrawlStatus::Error.is_terminal());
    }

    #[test]
    fn test_is_active() {
        assert!(CrawlStatus::Running.is_active());
        assert!(CrawlStatus::Paused.is_active());
        assert!(!CrawlStatus::Idle.is_active());
        assert!(!CrawlStatus::Stopped.is_active());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(CrawlStatus::Idle.can_transition_to(CrawlStatus::Running));
        assert!(CrawlStatus::Running.can_transition_to(CrawlStatus::Paused));
        assert!(CrawlStatus::Paused.can_transition_to(CrawlStatus::Running));
        assert!(CrawlStatus::Running.can_transition_to(CrawlStatus::Stopped));
        assert!(CrawlStatus::Paused.can_transition_to(CrawlStatus::Stopped));
        assert!(CrawlStatus::Running.can_transition_to(CrawlStatus::Error));
    }

    #[test]
    fn test_terminal_states_have_no_exit() {
        for to in CrawlStatus::all() {
            assert!(!CrawlStatus::Stopped.can_transition_to(to));
            assert!(!CrawlStatus::Error.can_transition_to(to));
        }
    }

    #[test]
    fn test_idle_cannot_skip_running() {
        assert!(!CrawlStatus::Idle.can_transition_to(CrawlStatus::Paused));
        assert!(!CrawlStatus::Idle.can_transition_to(CrawlStatus::Stopped));
    }

    #[test]
    fn test_db_string_roundtrip() {
        for status in CrawlStatus::all() {
            assert_eq!(
                CrawlStatus::from_db_string(status.to_db_string()),
                Some(status)
            );
        }
        assert_eq!(CrawlStatus::from_db_string("finished"), None);
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&CrawlStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }
}
