//! Execution strategies and their registry.
//!
//! ## Complexity → strategy
//!
//! | Strategy     | Complexity       | Budget                         |
//! |--------------|------------------|--------------------------------|
//! | `SingleShot` | Simple           | caller cancellation only       |
//! | `Iterative`  | Medium           | `max_iterations`, 60 s         |
//! | `MultiAgent` | Complex, Epic    | 180 s across all phases        |
//!
//! Every strategy returns exactly one [`StrategyExecutionResult`], success or
//! failure. Panics inside a strategy are caught in [`Strategy::execute`] and
//! reported as [`FailureKind::Internal`] with the spend recorded up to the
//! panic.

pub mod budget;
pub mod iterative;
pub mod multi_agent;
pub mod single_shot;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use task_coordination::{
    CodingTask, FailureKind, SpendLedger, StrategyExecutionResult, TaskComplexity,
    TaskExecutionContext,
};
use tokio_util::sync::CancellationToken;

pub use budget::{ExecutionBudget, Interrupted};
pub use iterative::{IterativeStrategy, ITERATIVE};
pub use multi_agent::{MultiAgentStrategy, MULTI_AGENT};
pub use single_shot::{SingleShotStrategy, SINGLE_SHOT};

use crate::agents::AgentSet;
use crate::config::EngineConfig;
use crate::llm::LlmClient;
use crate::validator::CodeValidator;

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Canonical name, e.g. `"SingleShot"`.
    fn name(&self) -> &'static str;

    fn supports_complexity(&self, complexity: TaskComplexity) -> bool;

    async fn execute(
        &self,
        task: &CodingTask,
        context: &mut TaskExecutionContext,
        cancel: &CancellationToken,
    ) -> StrategyExecutionResult;
}

/// The closed set of strategies.
pub enum Strategy {
    SingleShot(SingleShotStrategy),
    Iterative(IterativeStrategy),
    MultiAgent(MultiAgentStrategy),
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Strategy").field(&self.name()).finish()
    }
}

#[async_trait]
impl ExecutionStrategy for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::SingleShot(_) => SINGLE_SHOT,
            Self::Iterative(_) => ITERATIVE,
            Self::MultiAgent(_) => MULTI_AGENT,
        }
    }

    fn supports_complexity(&self, complexity: TaskComplexity) -> bool {
        match self {
            Self::SingleShot(s) => s.supports_complexity(complexity),
            Self::Iterative(s) => s.supports_complexity(complexity),
            Self::MultiAgent(s) => s.supports_complexity(complexity),
        }
    }

    async fn execute(
        &self,
        task: &CodingTask,
        context: &mut TaskExecutionContext,
        cancel: &CancellationToken,
    ) -> StrategyExecutionResult {
        let mut ledger = SpendLedger::start(self.name());
        let run = async {
            match self {
                Self::SingleShot(s) => s.execute(task, context, cancel, &mut ledger).await,
                Self::Iterative(s) => s.execute(task, context, cancel, &mut ledger).await,
                Self::MultiAgent(s) => s.execute(task, context, cancel, &mut ledger).await,
            }
        };

        let outcome = AssertUnwindSafe(run).catch_unwind().await;
        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    strategy = self.name(),
                    task_id = %task.id,
                    panic = %message,
                    tokens = ledger.tokens(),
                    "strategy panicked"
                );
                ledger.fail(
                    FailureKind::Internal,
                    vec![format!("{} panicked: {message}", self.name())],
                    0,
                )
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lowercase with `_`, `-` and spaces removed: `single_shot` == `SingleShot`.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strategies in registration order.
#[derive(Debug, Default, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// SingleShot, Iterative and MultiAgent wired to the given collaborators.
    pub fn standard(
        config: &EngineConfig,
        llm: Arc<dyn LlmClient>,
        validator: Arc<dyn CodeValidator>,
        agents: AgentSet,
    ) -> Self {
        let parser = config.parser.limits();
        let mut registry = Self::new();
        registry.register(Strategy::SingleShot(SingleShotStrategy::new(
            llm.clone(),
            validator.clone(),
            config.single_shot.clone(),
            parser,
        )));
        registry.register(Strategy::Iterative(IterativeStrategy::new(
            llm,
            validator.clone(),
            config.iterative.clone(),
            parser,
        )));
        registry.register(Strategy::MultiAgent(MultiAgentStrategy::new(
            agents,
            validator,
            config.multi_agent.clone(),
        )));
        registry
    }

    pub fn register(&mut self, strategy: Strategy) {
        tracing::debug!(strategy = strategy.name(), "registered strategy");
        self.strategies.push(Arc::new(strategy));
    }

    /// Case- and separator-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<Arc<Strategy>> {
        let wanted = normalize(name);
        self.strategies
            .iter()
            .find(|s| normalize(s.name()) == wanted)
            .cloned()
    }

    /// First registered strategy that supports `complexity`.
    pub fn for_complexity(&self, complexity: TaskComplexity) -> Option<Arc<Strategy>> {
        self.strategies
            .iter()
            .find(|s| s.supports_complexity(complexity))
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_normalize_across_styles() {
        for name in ["single_shot", "SingleShot", "single-shot", "SINGLESHOT", "Single Shot"] {
            assert_eq!(normalize(name), "singleshot", "{name}");
        }
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(boxed.as_ref()), "kaboom");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = StrategyRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("SingleShot").is_none());
        assert!(registry.for_complexity(TaskComplexity::Simple).is_none());
    }
}
