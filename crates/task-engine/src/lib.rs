//! Task execution engine.
//!
//! Takes a [`CodingTask`](task_coordination::CodingTask), picks an execution
//! strategy from its estimated complexity and drives that strategy to a
//! [`StrategyExecutionResult`](task_coordination::StrategyExecutionResult).
//!
//! | Module        | Purpose                                                   |
//! |---------------|-----------------------------------------------------------|
//! | `llm`         | `LlmClient` contract and OpenAI-compatible HTTP client    |
//! | `validator`   | `CodeValidator` contract and structural validator         |
//! | `classifier`  | `ClassifierClient` contract and HTTP client with breaker  |
//! | `agents`      | planner/coder/reviewer/tester contracts and LLM agents    |
//! | `strategies`  | SingleShot, Iterative, MultiAgent and the registry        |
//! | `selector`    | complexity → strategy, with heuristic fallback            |
//! | `engine`      | task lifecycle around one strategy run                    |
//! | `config`      | TOML + environment configuration                          |

pub mod agents;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod llm;
pub mod prompts;
pub mod selector;
pub mod strategies;
pub mod validator;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, TaskEngine};
pub use selector::{SelectionError, StrategySelector};
pub use strategies::{ExecutionStrategy, Strategy, StrategyRegistry};
