//! Planner output: an ordered list of subtasks with dependency edges.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One unit of work assigned to a single coder agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub description: String,
    /// Ids of subtasks that must finish before this one starts.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Files the planner expects this subtask to touch.
    #[serde(default)]
    pub files: Vec<String>,
}

impl SubTask {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            dependencies: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn is_independent(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Decomposition of a task into subtasks, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub subtasks: Vec<SubTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("plan is not valid JSON: {0}")]
    Malformed(String),

    #[error("plan contains no subtasks")]
    Empty,

    #[error("duplicate subtask id: {0}")]
    DuplicateId(String),
}

/// Wire shape accepted from the planner: either `{"subtasks": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanWire {
    Object { subtasks: Vec<SubTask> },
    List(Vec<SubTask>),
}

impl TaskPlan {
    pub fn new(subtasks: Vec<SubTask>) -> Self {
        Self { subtasks }
    }

    /// Parse planner output, tolerating markdown fences and surrounding prose.
    pub fn parse(raw: &str) -> Result<Self, PlanError> {
        let json = extract_json(raw);
        let wire: PlanWire =
            serde_json::from_str(json).map_err(|e| PlanError::Malformed(e.to_string()))?;
        let subtasks = match wire {
            PlanWire::Object { subtasks } | PlanWire::List(subtasks) => subtasks,
        };

        if subtasks.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut seen = HashSet::new();
        for subtask in &subtasks {
            if !seen.insert(subtask.id.as_str()) {
                return Err(PlanError::DuplicateId(subtask.id.clone()));
            }
        }

        Ok(Self { subtasks })
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Split into (independent, dependent) subtasks, each in plan order.
    pub fn partition(&self) -> (Vec<SubTask>, Vec<SubTask>) {
        self.subtasks
            .iter()
            .cloned()
            .partition(SubTask::is_independent)
    }
}

/// Locate the JSON payload in an LLM response.
fn extract_json(raw: &str) -> &str {
    let stripped = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let start = stripped.find(['{', '[']);
    let end = stripped.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end >= start => &stripped[start..=end],
        _ => stripped,
    }
}
