//! Coding task entity and its classification vocabulary.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::status::{TaskStatus, TransitionRecord};

/// Kind of work a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    BugFix,
    Feature,
    Refactor,
    Documentation,
    Test,
    Deployment,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BugFix => write!(f, "bug_fix"),
            Self::Feature => write!(f, "feature"),
            Self::Refactor => write!(f, "refactor"),
            Self::Documentation => write!(f, "documentation"),
            Self::Test => write!(f, "test"),
            Self::Deployment => write!(f, "deployment"),
        }
    }
}

/// Estimated size of a task. Drives strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskComplexity {
    Simple,
    Medium,
    Complex,
    Epic,
}

impl TaskComplexity {
    /// Rough token budget a run of this size is expected to consume.
    pub fn estimated_tokens(self) -> u64 {
        match self {
            Self::Simple => 2_000,
            Self::Medium => 6_000,
            Self::Complex => 20_000,
            Self::Epic => 40_000,
        }
    }
}

impl fmt::Display for TaskComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Medium => write!(f, "medium"),
            Self::Complex => write!(f, "complex"),
            Self::Epic => write!(f, "epic"),
        }
    }
}

impl FromStr for TaskComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "medium" => Ok(Self::Medium),
            "complex" => Ok(Self::Complex),
            "epic" => Ok(Self::Epic),
            other => Err(format!("unknown complexity: {other}")),
        }
    }
}

/// Errors raised by task lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("illegal status transition: {from} → {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    #[error("task {id} cannot be classified while {status}")]
    ClassifyNotAllowed { id: Uuid, status: TaskStatus },
}

/// A unit of work to perform on a codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    /// Set by classification; `None` until then.
    pub task_type: Option<TaskType>,
    /// Set by classification; `None` until then.
    pub complexity: Option<TaskComplexity>,
    status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    transitions: Vec<TransitionRecord>,
}

impl CodingTask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            task_type: None,
            complexity: None,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            transitions: Vec::new(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_classified(&self) -> bool {
        self.task_type.is_some() && self.complexity.is_some()
    }

    /// Full transition log for this attempt.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Record the type and complexity of the task.
    ///
    /// Only legal while the task is still `Pending`.
    pub fn classify(
        &mut self,
        task_type: TaskType,
        complexity: TaskComplexity,
    ) -> Result<(), TaskError> {
        if self.status != TaskStatus::Pending {
            return Err(TaskError::ClassifyNotAllowed {
                id: self.id,
                status: self.status,
            });
        }
        self.task_type = Some(task_type);
        self.complexity = Some(complexity);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TaskError> {
        self.advance(TaskStatus::InProgress, None)
    }

    pub fn complete(&mut self) -> Result<(), TaskError> {
        self.advance(TaskStatus::Completed, None)
    }

    pub fn fail(&mut self, reason: &str) -> Result<(), TaskError> {
        self.advance(TaskStatus::Failed, Some(reason))
    }

    pub fn cancel(&mut self, reason: &str) -> Result<(), TaskError> {
        self.advance(TaskStatus::Cancelled, Some(reason))
    }

    fn advance(&mut self, to: TaskStatus, reason: Option<&str>) -> Result<(), TaskError> {
        if !self.status.can_transition_to(to) {
            return Err(TaskError::IllegalTransition {
                from: self.status,
                to,
            });
        }

        tracing::debug!(
            task_id = %self.id,
            from = %self.status,
            to = %to,
            "task status transition"
        );

        let now = Utc::now();
        self.transitions.push(TransitionRecord {
            from: self.status,
            to,
            at: now,
            reason: reason.map(String::from),
        });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
