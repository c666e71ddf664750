//! Task status state machine: explicit states and legal transition guards.
//!
//! Every execution attempt starts at `Pending` and terminates at one of
//! `Completed`, `Failed` or `Cancelled`. Transitions only ever move forward;
//! a terminal status accepts no further transitions within the attempt.
//!
//! ```text
//! Pending → InProgress | Cancelled
//! InProgress → Completed | Failed | Cancelled
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`crate::task::CodingTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up. Classification is only allowed here.
    Pending,
    /// A strategy is executing the task.
    InProgress,
    /// Strategy succeeded: terminal.
    Completed,
    /// Strategy failed or timed out: terminal.
    Failed,
    /// Caller cancelled the attempt: terminal.
    Cancelled,
}

impl TaskStatus {
    /// Whether this is a terminal status (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether moving from `self` to `to` is an edge of the status graph.
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single recorded status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
    /// Optional context about why this transition happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
