//! Worker lifecycle states.

use std::fmt;

/// Lifecycle of a single worker agent, from construction to teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    New,
    Spawned,
    Running,
    Stopped,
    CleanedUp,
}

impl WorkerState {
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::New, Self::Spawned)
                | (Self::Spawned, Self::Running)
                | (Self::Running, Self::Running)
                | (Self::Running, Self::Stopped)
                | (Self::Stopped, Self::Running)
                | (Self::Stopped, Self::CleanedUp)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::CleanedUp)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Spawned => "spawned",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::CleanedUp => "cleaned_up",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_skip_spawn_before_running() {
        assert!(!WorkerState::New.can_transition_to(WorkerState::Running));
        assert!(WorkerState::New.can_transition_to(WorkerState::Spawned));
    }

    #[test]
    fn stopped_can_resume_or_clean_up() {
        assert!(WorkerState::Stopped.can_transition_to(WorkerState::Running));
        assert!(WorkerState::Stopped.can_transition_to(WorkerState::CleanedUp));
    }

    #[test]
    fn cleaned_up_is_terminal() {
        assert!(WorkerState::CleanedUp.is_terminal());
        assert!(!WorkerState::CleanedUp.can_transition_to(WorkerState::Running));
    }
}
