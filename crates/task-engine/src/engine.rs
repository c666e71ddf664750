//! Task lifecycle driver: select, start, execute, settle.

use std::sync::Arc;

use task_coordination::{
    CodingTask, FailureKind, StrategyExecutionResult, TaskError, TaskExecutionContext,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agents::{AgentSet, AgentSettings};
use crate::classifier::{ClassifierError, HttpClassifierClient};
use crate::config::EngineConfig;
use crate::llm::{LlmClient, LlmError, OpenAiCompatClient};
use crate::selector::{SelectionError, StrategySelector};
use crate::strategies::{ExecutionStrategy, StrategyRegistry};
use crate::validator::{CodeValidator, StructuralValidator};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("strategy selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("failed to build LLM client: {0}")]
    Llm(#[from] LlmError),

    #[error("failed to build classifier client: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("task was cancelled before it started")]
    CancelledBeforeStart,
}

pub struct TaskEngine {
    selector: StrategySelector,
}

impl TaskEngine {
    pub fn new(selector: StrategySelector) -> Self {
        Self { selector }
    }

    /// Wire the HTTP LLM client, structural validator, LLM-backed agents and
    /// (when configured) the remote classifier.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatClient::new(&config.llm)?);
        let validator: Arc<dyn CodeValidator> = Arc::new(StructuralValidator::new());
        let agents = AgentSet::from_llm(
            llm.clone(),
            AgentSettings {
                model: None,
                temperature: config.multi_agent.temperature,
                max_tokens: config.multi_agent.max_tokens,
                parser: config.parser.limits(),
            },
        );
        let registry = StrategyRegistry::standard(config, llm, validator, agents);

        let mut selector =
            StrategySelector::new(registry).with_classifier_timeout(config.classifier.timeout());
        if let Some(url) = &config.classifier.base_url {
            info!(url = %url, "using remote classifier");
            selector = selector.with_classifier(Arc::new(HttpClassifierClient::new(
                url,
                &config.classifier,
            )?));
        }
        Ok(Self::new(selector))
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Drive `task` through one execution attempt.
    ///
    /// The task ends `Completed`, `Failed` or `Cancelled` to match the
    /// returned result. Selection errors leave it `Pending`.
    pub async fn run(
        &self,
        task: &mut CodingTask,
        context: &mut TaskExecutionContext,
        strategy_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StrategyExecutionResult, EngineError> {
        if cancel.is_cancelled() {
            task.cancel("cancelled before start")?;
            return Err(EngineError::CancelledBeforeStart);
        }

        let strategy = self
            .selector
            .select_strategy(task, context, strategy_override)
            .await?;

        task.start()?;
        info!(task_id = %task.id, strategy = strategy.name(), "task started");

        let result = strategy.execute(task, context, cancel).await;

        if result.success {
            task.complete()?;
            info!(
                task_id = %task.id,
                strategy = %result.strategy,
                changes = result.changes.len(),
                tokens = result.total_tokens_used,
                cost_usd = result.total_cost_usd,
                duration_ms = result.duration.as_millis() as u64,
                iterations = result.iterations_used,
                "task completed"
            );
        } else {
            let reason = result
                .errors
                .first()
                .cloned()
                .unwrap_or_else(|| "strategy failed".to_string());
            match result.failure {
                Some(FailureKind::Cancelled) => task.cancel(&reason)?,
                _ => task.fail(&reason)?,
            }
            warn!(
                task_id = %task.id,
                strategy = %result.strategy,
                failure = ?result.failure,
                tokens = result.total_tokens_used,
                reason = %reason,
                "task did not complete"
            );
        }

        Ok(result)
    }
}
