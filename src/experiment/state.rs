//! Lifecycle state shared by executions, runs and splits

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lifecycle state of a tracked entity.
///
/// ```text
/// created ──> configured ──> running ──> completed
///    │            │             │
///    └────────────┴─────────────┴──────> failed
/// ```
///
/// `created -> running` is allowed for entities without a configuration step
/// (splits). `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Instantiated, nothing validated yet.
    #[default]
    Created,
    /// Validated and ready to run.
    Configured,
    /// Currently executing.
    Running,
    /// Finished (possibly with a partial-success report).
    Completed,
    /// Stopped by an unrecovered error.
    Failed,
}

impl LifecycleState {
    /// True for `completed` and `failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Created, Self::Configured | Self::Running)
            | (Self::Configured, Self::Running)
            | (Self::Running, Self::Completed) => true,
            (current, Self::Failed) => !current.is_terminal(),
            _ => false,
        }
    }

    /// Move to `next`, or explain why that is not allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] for illegal moves, including any
    /// move out of a terminal state.
    pub fn transition(&mut self, entity: &str, next: Self) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                entity: entity.to_string(),
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = LifecycleState::default();
        state.transition("run r1", LifecycleState::Configured).unwrap();
        state.transition("run r1", LifecycleState::Running).unwrap();
        state.transition("run r1", LifecycleState::Completed).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        for start in [
            LifecycleState::Created,
            LifecycleState::Configured,
            LifecycleState::Running,
        ] {
            assert!(start.can_transition_to(LifecycleState::Failed));
        }
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut state = LifecycleState::Completed;
        let err = state.transition("split s1", LifecycleState::Failed).unwrap_err();
        assert!(err.to_string().contains("completed -> failed"));

        let mut state = LifecycleState::Failed;
        assert!(state.transition("split s1", LifecycleState::Running).is_err());
    }

    #[test]
    fn test_cannot_skip_running() {
        assert!(!LifecycleState::Configured.can_transition_to(LifecycleState::Completed));
        assert!(!LifecycleState::Created.can_transition_to(LifecycleState::Completed));
    }

    #[test]
    fn test_serialized_form() {
        let json = serde_json::to_string(&LifecycleState::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
