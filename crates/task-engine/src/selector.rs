//! Maps a task to a strategy.
//!
//! ```text
//! manual override ──► registry lookup by name ──────────────────────────► strategy
//! otherwise ──► remote classifier (timeout) ──ok──► classify task ──► first registered
//!                     │ error / timeout / circuit open                    strategy supporting
//!                     └──► heuristic ─────────────► classify task ──►   the complexity
//! ```
//!
//! Classifier failures never reach the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use task_coordination::{
    ClassificationResult, CodingTask, HeuristicClassifier, TaskComplexity, TaskError,
    TaskExecutionContext,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classifier::ClassifierClient;
use crate::strategies::{ExecutionStrategy, Strategy, StrategyRegistry};

/// Selection slower than this is logged at `warn`.
const SLOW_SELECTION: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("unknown strategy '{name}' (available: {})", .available.join(", "))]
    UnknownStrategy {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("no registered strategy supports {0} tasks")]
    NoStrategyFor(TaskComplexity),

    #[error(transparent)]
    Task(#[from] TaskError),
}

pub struct StrategySelector {
    registry: StrategyRegistry,
    classifier: Option<Arc<dyn ClassifierClient>>,
    heuristic: HeuristicClassifier,
    classifier_timeout: Duration,
}

impl StrategySelector {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self {
            registry,
            classifier: None,
            heuristic: HeuristicClassifier::new(),
            classifier_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ClassifierClient>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Pick the strategy for `task`.
    ///
    /// With `manual_override` the named strategy is returned as-is and the
    /// task is left unclassified. Otherwise the task is classified (remote
    /// classifier, heuristic on any failure) and its type and complexity are
    /// recorded before the strategy is chosen.
    pub async fn select_strategy(
        &self,
        task: &mut CodingTask,
        context: &TaskExecutionContext,
        manual_override: Option<&str>,
    ) -> Result<Arc<Strategy>, SelectionError> {
        let started = Instant::now();

        if let Some(name) = manual_override {
            let strategy = self
                .registry
                .get(name)
                .ok_or_else(|| SelectionError::UnknownStrategy {
                    name: name.to_string(),
                    available: self.registry.names(),
                })?;
            info!(
                task_id = %task.id,
                strategy = strategy.name(),
                "strategy selected by manual override"
            );
            return Ok(strategy);
        }

        let classification = self
            .classify_description(&task.description, &context.file_paths())
            .await;
        task.classify(classification.task_type, classification.complexity)?;

        let strategy = self
            .registry
            .for_complexity(classification.complexity)
            .ok_or(SelectionError::NoStrategyFor(classification.complexity))?;

        let selection_ms = started.elapsed().as_millis() as u64;
        if started.elapsed() > SLOW_SELECTION {
            warn!(
                task_id = %task.id,
                strategy = strategy.name(),
                selection_ms,
                "slow strategy selection"
            );
        }
        info!(
            task_id = %task.id,
            task_type = %classification.task_type,
            complexity = %classification.complexity,
            confidence = classification.confidence,
            classifier = classification.classifier_used.as_deref().unwrap_or("remote"),
            suggested = %classification.suggested_strategy,
            strategy = strategy.name(),
            selection_ms,
            "strategy selected"
        );
        Ok(strategy)
    }

    /// Classify a description without touching any task.
    pub async fn classify_description(
        &self,
        description: &str,
        files_changed: &[String],
    ) -> ClassificationResult {
        let Some(classifier) = &self.classifier else {
            return self.heuristic.classify(description);
        };

        if !classifier.is_available() {
            debug!("remote classifier unavailable; using heuristic");
            return self.heuristic.classify(description);
        }

        match tokio::time::timeout(
            self.classifier_timeout,
            classifier.classify(description, files_changed),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(error = %e, "remote classifier failed; using heuristic");
                self.heuristic.classify(description)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.classifier_timeout.as_millis() as u64,
                    "remote classifier timed out; using heuristic"
                );
                self.heuristic.classify(description)
            }
        }
    }
}
