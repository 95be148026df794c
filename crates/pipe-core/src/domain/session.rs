//! Session lifecycle states.
//!
//! The broker holds exactly one session.  It starts `Idle`, may pass through
//! `Syncing` while a scan runs, enters `Connecting` on CONNECT, reaches
//! `Bound` once association completes, and ends in `ShuttingDown`.

use std::fmt;

/// Current state of the broker's single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No link, no pending work.
    #[default]
    Idle,
    /// A scan for the console is running.
    Syncing,
    /// CONNECT was acknowledged; association is in progress.
    Connecting,
    /// Associated with the console.
    Bound,
    /// QUIT received; the loop exits after the current iteration.
    ShuttingDown,
}

impl SessionState {
    /// Returns `true` once no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::ShuttingDown)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Syncing => "syncing",
            SessionState::Connecting => "connecting",
            SessionState::Bound => "bound",
            SessionState::ShuttingDown => "shutting-down",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn test_only_shutting_down_is_terminal() {
        assert!(SessionState::ShuttingDown.is_terminal());
        for state in [
            SessionState::Idle,
            SessionState::Syncing,
            SessionState::Connecting,
            SessionState::Bound,
        ] {
            assert!(!state.is_terminal(), "{state} must not be terminal");
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(SessionState::ShuttingDown.to_string(), "shutting-down");
        assert_eq!(SessionState::Bound.to_string(), "bound");
    }
}
