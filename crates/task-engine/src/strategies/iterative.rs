//! Generate → validate → re-prompt with the errors, bounded by an iteration
//! count and one wall-clock deadline for the whole run.
//!
//! ```text
//! iteration 0:  [system, user(task + files)]              → assistant → parse → validate
//! iteration n:  [..transcript, user(previous errors only)] → assistant → parse → validate
//! ```
//!
//! The transcript is resent in full on every call so the model sees its own
//! earlier attempts. Validation errors replace the context's error list each
//! round; they never accumulate.

use std::sync::Arc;

use task_coordination::{
    parse_code_changes, CodingTask, FailureKind, ParserLimits, SpendLedger,
    StrategyExecutionResult, TaskComplexity, TaskExecutionContext,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::budget::ExecutionBudget;
use crate::config::IterativeConfig;
use crate::llm::{ChatMessage, LlmClient, LlmRequest};
use crate::prompts;
use crate::validator::CodeValidator;

pub const ITERATIVE: &str = "Iterative";

/// Fed back to the model when a response contains no parseable files.
pub const NO_CHANGES_FEEDBACK: &str = "No code changes found in your response. Write \
`FILE: <path>` followed by a fenced code block for every file you change.";

pub struct IterativeStrategy {
    llm: Arc<dyn LlmClient>,
    validator: Arc<dyn CodeValidator>,
    config: IterativeConfig,
    parser: ParserLimits,
    model: Option<String>,
}

impl IterativeStrategy {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        validator: Arc<dyn CodeValidator>,
        config: IterativeConfig,
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
        complexity == TaskComplexity::Medium
    }

    /// Run the strategy, recording every returned call in `ledger`.
    pub async fn execute(
        &self,
        task: &CodingTask,
        context: &mut TaskExecutionContext,
        cancel: &CancellationToken,
        ledger: &mut SpendLedger,
    ) -> StrategyExecutionResult {
        let budget = ExecutionBudget::new(cancel, Some(self.config.timeout()));
        let max_iterations = self.config.max_iterations.max(1);

        let mut transcript = vec![ChatMessage::system(prompts::iterative_preamble())];
        let mut completed = 0;
        let mut last_failure = FailureKind::Validation;

        info!(
            strategy = ITERATIVE,
            task_id = %task.id,
            max_iterations,
            "starting"
        );

        for iteration in 0..max_iterations {
            context.current_iteration = iteration;

            let prompt = if iteration == 0 {
                prompts::task_prompt(task, context)
            } else {
                prompts::correction_prompt(&context.validation_errors)
            };
            transcript.push(ChatMessage::user(prompt));

            let request = LlmRequest::new(transcript.clone())
                .with_model(self.model.clone())
                .with_temperature(self.config.temperature)
                .with_max_tokens(self.config.max_tokens);

            let response = match budget.run(self.llm.generate(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!(strategy = ITERATIVE, iteration, error = %e, "generation failed");
                    return ledger.fail(
                        FailureKind::Generation,
                        vec![format!("LLM generation failed on iteration {}: {e}", iteration + 1)],
                        iteration + 1,
                    );
                }
                Err(interrupted) => {
                    warn!(strategy = ITERATIVE, iteration, completed, "interrupted: {interrupted}");
                    return ledger.fail(
                        interrupted.into(),
                        vec![format!(
                            "{} ({completed} iterations completed)",
                            budget.describe(interrupted, ITERATIVE)
                        )],
                        completed,
                    );
                }
            };
            ledger.record(response.tokens_used, response.cost_usd);

            let parsed =
                parse_code_changes(&response.content, &context.file_paths(), &self.parser);
            transcript.push(ChatMessage::assistant(response.content));

            if parsed.is_empty() {
                warn!(strategy = ITERATIVE, iteration, "no code changes parsed");
                context.replace_errors(vec![NO_CHANGES_FEEDBACK.to_string()]);
                last_failure = FailureKind::Parse;
                completed = iteration + 1;
                continue;
            }

            let validation = match budget.run(self.validator.validate(&parsed.changes)).await {
                Ok(validation) => validation,
                Err(interrupted) => {
                    return ledger.fail(
                        interrupted.into(),
                        vec![format!(
                            "{} ({completed} iterations completed)",
                            budget.describe(interrupted, ITERATIVE)
                        )],
                        completed,
                    );
                }
            };
            completed = iteration + 1;

            if validation.success {
                info!(
                    strategy = ITERATIVE,
                    task_id = %task.id,
                    iterations = completed,
                    tokens = ledger.tokens(),
                    "validation passed"
                );
                context.replace_errors(Vec::new());
                return ledger.succeed(parsed.changes, completed);
            }

            debug!(
                strategy = ITERATIVE,
                iteration,
                errors = validation.errors.len(),
                "validation failed"
            );
            context.replace_errors(validation.errors);
            last_failure = FailureKind::Validation;
        }

        warn!(
            strategy = ITERATIVE,
            task_id = %task.id,
            iterations = completed,
            "iterations exhausted"
        );
        let errors = context.validation_errors.clone();
        ledger.fail(last_failure, errors, completed)
    }
}
