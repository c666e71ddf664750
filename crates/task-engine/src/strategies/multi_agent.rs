//! Plan → parallel implementation → merge → review → validate → tests.
//!
//! ```text
//! Phase 1: Plan           planner → TaskPlan
//! Phase 2: Implement      JoinSet::spawn(coder, subtask) × independent subtasks
//!                         then dependents one by one, in plan order
//! Phase 3: Aggregate      changes from successful coders only
//! Phase 4: Merge          last write wins per path
//! Phase 5: Review gate    reject at severity ≥ threshold; unparseable = soft pass
//! Phase 6: Validate       terminal on failure
//! Phase 7: Tests          best effort, panics included; merged last-write-wins
//! ```
//!
//! One deadline covers every phase. Spawned coders carry a clone of the same
//! budget; their results are folded into the ledger on this task after the
//! join, so spend from coders that finished is kept even when a sibling was
//! interrupted.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use task_coordination::{
    merge_last_write_wins, overlay_changes, AgentResult, CodeChange, CodingTask, FailureKind,
    MergeReport, ReviewResult, SpendLedger, StrategyExecutionResult, SubTask, TaskComplexity,
    TaskExecutionContext, TaskPlan,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::budget::{ExecutionBudget, Interrupted};
use super::panic_message;
use crate::agents::{AgentError, AgentSet};
use crate::config::MultiAgentConfig;
use crate::validator::CodeValidator;

pub const MULTI_AGENT: &str = "MultiAgent";

type CoderOutcome = Result<Result<AgentResult, AgentError>, Interrupted>;

pub struct MultiAgentStrategy {
    agents: AgentSet,
    validator: Arc<dyn CodeValidator>,
    config: MultiAgentConfig,
}

/// Coder results folded on the orchestrating task.
#[derive(Default)]
struct Implementation {
    changes: Vec<CodeChange>,
    errors: Vec<String>,
    interrupted: Option<Interrupted>,
}

impl Implementation {
    fn absorb(&mut self, ledger: &mut SpendLedger, subtask_id: &str, outcome: CoderOutcome) {
        match outcome {
            Ok(Ok(result)) => {
                ledger.record_agent(&result);
                if result.success {
                    debug!(
                        strategy = MULTI_AGENT,
                        subtask = subtask_id,
                        changes = result.changes.len(),
                        "coder succeeded"
                    );
                    self.changes.extend(result.changes);
                } else {
                    warn!(strategy = MULTI_AGENT, subtask = subtask_id, "coder reported failure");
                    if result.errors.is_empty() {
                        self.errors.push(format!("subtask {subtask_id}: coder failed"));
                    }
                    self.errors.extend(
                        result
                            .errors
                            .into_iter()
                            .map(|e| format!("subtask {subtask_id}: {e}")),
                    );
                }
            }
            Ok(Err(e)) => {
                warn!(strategy = MULTI_AGENT, subtask = subtask_id, error = %e, "coder errored");
                self.errors.push(format!("subtask {subtask_id}: {e}"));
            }
            Err(interrupted) => {
                self.interrupted.get_or_insert(interrupted);
            }
        }
    }
}

impl MultiAgentStrategy {
    pub fn new(
        agents: AgentSet,
        validator: Arc<dyn CodeValidator>,
        config: MultiAgentConfig,
    ) -> Self {
        Self {
            agents,
            validator,
            config,
        }
    }

    pub fn supports_complexity(&self, complexity: TaskComplexity) -> bool {
        matches!(complexity, TaskComplexity::Complex | TaskComplexity::Epic)
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
        context.current_iteration = 0;

        info!(strategy = MULTI_AGENT, task_id = %task.id, "planning");

        // ── Phase 1: plan ────────────────────────────────────────────────
        let plan_result = match budget.run(self.agents.planner.plan(task, context)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return ledger.fail(FailureKind::Agent, vec![format!("planner failed: {e}")], 0);
            }
            Err(i) => return interrupted_result(ledger, &budget, i, 0),
        };
        ledger.record_agent(&plan_result);

        if !plan_result.success {
            let mut errors = vec!["planner reported failure".to_string()];
            errors.extend(plan_result.errors);
            return ledger.fail(FailureKind::Plan, errors, 0);
        }
        let plan = match TaskPlan::parse(&plan_result.output) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(strategy = MULTI_AGENT, error = %e, "unusable plan");
                return ledger.fail(FailureKind::Plan, vec![format!("planning failed: {e}")], 0);
            }
        };
        let (independent, dependent) = plan.partition();
        info!(
            strategy = MULTI_AGENT,
            subtasks = plan.subtasks.len(),
            parallel = independent.len(),
            sequential = dependent.len(),
            "plan ready"
        );

        // ── Phase 2: implement ───────────────────────────────────────────
        let mut implementation = Implementation::default();
        self.implement_parallel(
            task,
            context,
            independent,
            &budget,
            ledger,
            &mut implementation,
        )
        .await;
        if let Some(i) = implementation.interrupted {
            return interrupted_result(ledger, &budget, i, 0);
        }

        for subtask in dependent {
            let view = context.with_changes(&implementation.changes);
            let outcome = budget
                .run(self.agents.coder.implement(task, &subtask, &view))
                .await;
            implementation.absorb(ledger, &subtask.id, outcome);
            if let Some(i) = implementation.interrupted {
                return interrupted_result(ledger, &budget, i, 0);
            }
        }

        // ── Phase 3: aggregate ───────────────────────────────────────────
        if implementation.changes.is_empty() {
            let mut errors = vec!["No code changes produced by any coder".to_string()];
            errors.extend(implementation.errors);
            return ledger.fail(FailureKind::NoChanges, errors, 1);
        }
        if !implementation.errors.is_empty() {
            warn!(
                strategy = MULTI_AGENT,
                failed = implementation.errors.len(),
                "continuing with partial coder output"
            );
        }

        // ── Phase 4: merge ───────────────────────────────────────────────
        let merged = log_conflicts(merge_last_write_wins(implementation.changes));

        // ── Phase 5: review ──────────────────────────────────────────────
        let review = match budget.run(self.agents.reviewer.review(task, &merged)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                return ledger.fail(FailureKind::Agent, vec![format!("reviewer failed: {e}")], 1);
            }
            Err(i) => return interrupted_result(ledger, &budget, i, 1),
        };
        ledger.record_agent(&review);
        if let Some(rejection) = self.review_gate(&review) {
            return ledger.fail(FailureKind::ReviewRejected, rejection, 1);
        }

        // ── Phase 6: validate ────────────────────────────────────────────
        let validation = match budget.run(self.validator.validate(&merged)).await {
            Ok(validation) => validation,
            Err(i) => return interrupted_result(ledger, &budget, i, 1),
        };
        if !validation.success {
            warn!(
                strategy = MULTI_AGENT,
                errors = validation.errors.len(),
                "validation failed"
            );
            context.replace_errors(validation.errors.clone());
            return ledger.fail(FailureKind::Validation, validation.errors, 1);
        }

        // ── Phase 7: tests (best effort) ─────────────────────────────────
        let tester = AssertUnwindSafe(self.agents.tester.generate_tests(task, &merged, context))
            .catch_unwind();
        let tests = match budget.run(tester).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                Err(AgentError::fault("tester", format!("panicked: {message}")))
            }
            Err(i) => return interrupted_result(ledger, &budget, i, 1),
        };
        let changes = match tests {
            Ok(result) => {
                ledger.record_agent(&result);
                if result.success && !result.changes.is_empty() {
                    debug!(strategy = MULTI_AGENT, tests = result.changes.len(), "tests generated");
                    log_conflicts(overlay_changes(merged, result.changes))
                } else {
                    warn!(
                        strategy = MULTI_AGENT,
                        errors = ?result.errors,
                        "tester produced no tests"
                    );
                    merged
                }
            }
            Err(e) => {
                warn!(
                    strategy = MULTI_AGENT,
                    error = %e,
                    "tester failed; continuing without tests"
                );
                merged
            }
        };

        info!(
            strategy = MULTI_AGENT,
            task_id = %task.id,
            changes = changes.len(),
            tokens = ledger.tokens(),
            cost_usd = ledger.cost_usd(),
            "completed"
        );
        ledger.succeed(changes, 1)
    }

    /// Fan out independent subtasks, bounded by `max_parallel_coders`, and
    /// fold every outcome in plan order once all have joined.
    async fn implement_parallel(
        &self,
        task: &CodingTask,
        context: &TaskExecutionContext,
        subtasks: Vec<SubTask>,
        budget: &ExecutionBudget,
        ledger: &mut SpendLedger,
        implementation: &mut Implementation,
    ) {
        if subtasks.is_empty() {
            return;
        }

        let sem = Arc::new(Semaphore::new(self.config.max_parallel_coders.max(1)));
        let task = Arc::new(task.clone());
        let context = Arc::new(context.clone());
        let mut join_set: JoinSet<(usize, String, CoderOutcome)> = JoinSet::new();

        for (idx, subtask) in subtasks.into_iter().enumerate() {
            let sem = sem.clone();
            let task = task.clone();
            let context = context.clone();
            let coder = self.agents.coder.clone();
            let budget = budget.clone();

            join_set.spawn(async move {
                let outcome = budget
                    .run(async {
                        let _permit = sem
                            .acquire()
                            .await
                            .map_err(|_| AgentError::Unavailable("coder pool".to_string()))?;
                        coder.implement(&task, &subtask, &context).await
                    })
                    .await;
                (idx, subtask.id, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(strategy = MULTI_AGENT, error = %e, "coder task panicked");
                    implementation.errors.push(format!("coder task panicked: {e}"));
                }
            }
        }

        // Completion order is arbitrary; plan order keeps the merge deterministic.
        outcomes.sort_by_key(|(idx, _, _)| *idx);
        for (_, subtask_id, outcome) in outcomes {
            implementation.absorb(ledger, &subtask_id, outcome);
        }
    }

    /// `Some(errors)` when the review blocks the run.
    fn review_gate(&self, review: &AgentResult) -> Option<Vec<String>> {
        if !review.success {
            warn!(
                strategy = MULTI_AGENT,
                errors = ?review.errors,
                "reviewer reported failure; skipping gate"
            );
            return None;
        }
        let Some(verdict) = ReviewResult::parse(&review.output) else {
            warn!(strategy = MULTI_AGENT, "review output unparseable; skipping gate");
            return None;
        };

        let threshold = self.config.review_rejection_severity;
        if verdict.rejects_at(threshold) {
            warn!(
                strategy = MULTI_AGENT,
                severity = verdict.severity,
                threshold,
                issues = verdict.issues.len(),
                "review rejected changes"
            );
            let mut errors = vec![format!(
                "Review rejected changes with severity {}",
                verdict.severity
            )];
            errors.extend(verdict.issues);
            return Some(errors);
        }

        info!(
            strategy = MULTI_AGENT,
            approved = verdict.approved,
            severity = verdict.severity,
            "review passed"
        );
        None
    }
}

fn interrupted_result(
    ledger: &SpendLedger,
    budget: &ExecutionBudget,
    interrupted: Interrupted,
    iterations_used: u32,
) -> StrategyExecutionResult {
    warn!(strategy = MULTI_AGENT, "interrupted: {interrupted}");
    ledger.fail(
        interrupted.into(),
        vec![budget.describe(interrupted, MULTI_AGENT)],
        iterations_used,
    )
}

fn log_conflicts(report: MergeReport) -> Vec<CodeChange> {
    for conflict in &report.conflicts {
        warn!(
            strategy = MULTI_AGENT,
            path = %conflict.file_path,
            competing = conflict.competing,
            "conflicting changes; keeping last write"
        );
    }
    report.changes
}
