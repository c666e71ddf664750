//! One generation, one validation, no self-correction.

use std::sync::Arc;

use task_coordination::{
    parse_code_changes, CodingTask, FailureKind, ParserLimits, SpendLedger,
    StrategyExecutionResult, TaskComplexity, TaskExecutionContext,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::budget::ExecutionBudget;
use crate::config::SingleShotConfig;
use crate::llm::{ChatMessage, LlmClient, LlmRequest};
use crate::prompts;
use crate::validator::CodeValidator;

pub const SINGLE_SHOT: &str = "SingleShot";

pub struct SingleShotStrategy {
    llm: Arc<dyn LlmClient>,
    validator: Arc<dyn CodeValidator>,
    config: SingleShotConfig,
    parser: ParserLimits,
    model: Option<String>,
}

impl SingleShotStrategy {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        validator: Arc<dyn CodeValidator>,
        config: SingleShotConfig,
        parser: ParserLimits,
    ) -> Self {
        Self {
            llm,
            validator,
            config,
            parser,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn supports_complexity(&self, complexity: TaskComplexity) -> bool {
        complexity == TaskComplexity::Simple
    }

    /// Run the strategy, recording every returned call in `ledger`.
    pub async fn execute(
        &self,
        task: &CodingTask,
        context: &mut TaskExecutionContext,
        cancel: &CancellationToken,
        ledger: &mut SpendLedger,
    ) -> StrategyExecutionResult {
        let budget = ExecutionBudget::new(cancel, None);
        context.current_iteration = 0;

        info!(strategy = SINGLE_SHOT, task_id = %task.id, "generating");

        let request = LlmRequest::new(vec![
            ChatMessage::system(prompts::single_shot_preamble()),
            ChatMessage::user(prompts::task_prompt(task, context)),
        ])
        .with_model(self.model.clone())
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = match budget.run(self.llm.generate(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(strategy = SINGLE_SHOT, error = %e, "generation failed");
                return ledger.fail(
                    FailureKind::Generation,
                    vec![format!("LLM generation failed: {e}")],
                    1,
                );
            }
            Err(interrupted) => {
                return ledger.fail(
                    interrupted.into(),
                    vec![budget.describe(interrupted, SINGLE_SHOT)],
                    0,
                );
            }
        };
        ledger.record(response.tokens_used, response.cost_usd);

        let parsed = parse_code_changes(&response.content, &context.file_paths(), &self.parser);
        if parsed.is_empty() {
            warn!(
                strategy = SINGLE_SHOT,
                markers = parsed.markers,
                blocks = parsed.blocks,
                "no code changes in response"
            );
            return ledger.fail(
                FailureKind::Parse,
                vec!["No code changes found in LLM response".to_string()],
                1,
            );
        }

        let validation = match budget.run(self.validator.validate(&parsed.changes)).await {
            Ok(validation) => validation,
            Err(interrupted) => {
                return ledger.fail(
                    interrupted.into(),
                    vec![budget.describe(interrupted, SINGLE_SHOT)],
                    1,
                );
            }
        };
        if !validation.success {
            warn!(
                strategy = SINGLE_SHOT,
                errors = validation.errors.len(),
                "validation failed"
            );
            context.replace_errors(validation.errors.clone());
            return ledger.fail(FailureKind::Validation, validation.errors, 1);
        }

        info!(
            strategy = SINGLE_SHOT,
            task_id = %task.id,
            changes = parsed.changes.len(),
            tokens = ledger.tokens(),
            "completed"
        );
        ledger.succeed(parsed.changes, 1)
    }
}
