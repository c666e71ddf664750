//! Specialized agents consumed by the multi-agent strategy.
//!
//! | Role       | Input                           | Output (`AgentResult.output` / `.changes`) |
//! |------------|---------------------------------|--------------------------------------------|
//! | `planner`  | task + context                  | JSON `TaskPlan`                            |
//! | `coder`    | task + one subtask + context    | code changes                               |
//! | `reviewer` | task + merged change set        | JSON `ReviewResult`                        |
//! | `tester`   | task + merged change set        | test file changes                          |
//!
//! `AgentResult { success: false, .. }` is an ordinary outcome; `Err` is
//! reserved for faults where the agent could not produce a result at all.

pub mod llm;

use std::sync::Arc;

use async_trait::async_trait;
use task_coordination::{AgentResult, CodeChange, CodingTask, SubTask, TaskExecutionContext};

pub use llm::{AgentSettings, LlmCoder, LlmPlanner, LlmReviewer, LlmTester};

use crate::llm::LlmClient;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{0}: agent unavailable")]
    Unavailable(String),

    #[error("{agent}: {message}")]
    Fault {
        agent: String,
        message: String,
    },
}

impl AgentError {
    pub fn fault(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait PlannerAgent: Send + Sync {
    async fn plan(
        &self,
        task: &CodingTask,
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError>;
}

#[async_trait]
pub trait CoderAgent: Send + Sync {
    async fn implement(
        &self,
        task: &CodingTask,
        subtask: &SubTask,
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError>;
}

#[async_trait]
pub trait ReviewerAgent: Send + Sync {
    async fn review(
        &self,
        task: &CodingTask,
        changes: &[CodeChange],
    ) -> Result<AgentResult, AgentError>;
}

#[async_trait]
pub trait TesterAgent: Send + Sync {
    async fn generate_tests(
        &self,
        task: &CodingTask,
        changes: &[CodeChange],
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError>;
}

/// The four agents a multi-agent run needs.
#[derive(Clone)]
pub struct AgentSet {
    pub planner: Arc<dyn PlannerAgent>,
    pub coder: Arc<dyn CoderAgent>,
    pub reviewer: Arc<dyn ReviewerAgent>,
    pub tester: Arc<dyn TesterAgent>,
}

impl AgentSet {
    pub fn new(
        planner: Arc<dyn PlannerAgent>,
        coder: Arc<dyn CoderAgent>,
        reviewer: Arc<dyn ReviewerAgent>,
        tester: Arc<dyn TesterAgent>,
    ) -> Self {
        Self {
            planner,
            coder,
            reviewer,
            tester,
        }
    }

    /// All four roles backed by the same LLM client.
    pub fn from_llm(llm: Arc<dyn LlmClient>, settings: AgentSettings) -> Self {
        Self::new(
            Arc::new(LlmPlanner::new(llm.clone(), settings.clone())),
            Arc::new(LlmCoder::new(llm.clone(), settings.clone())),
            Arc::new(LlmReviewer::new(llm.clone(), settings.clone())),
            Arc::new(LlmTester::new(llm, settings)),
        )
    }
}

impl std::fmt::Debug for AgentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSet").finish_non_exhaustive()
    }
}
