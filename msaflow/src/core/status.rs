//! Stage status and launch state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The recorded status of one stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Stage completed successfully.
    Completed,
    /// Stage failed.
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of the pipeline subprocess.
///
/// `NotStarted -> Running -> {Succeeded, Failed}`. The log epilogue runs on the
/// way out of `Running`, whichever terminal state is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchState {
    /// The command has been built but not spawned.
    #[default]
    NotStarted,
    /// The subprocess is running.
    Running,
    /// The subprocess exited with code zero.
    Succeeded,
    /// The subprocess failed to start or exited unsuccessfully.
    Failed,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl LaunchState {
    /// Returns true if the state represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// A spawn failure moves straight from `NotStarted` to `Failed`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running | Self::Failed)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }

    /// Moves to `next`, returning the new state, or `None` for an illegal move.
    #[must_use]
    pub fn transition(self, next: Self) -> Option<Self> {
        self.can_transition_to(next).then_some(next)
    }
}
