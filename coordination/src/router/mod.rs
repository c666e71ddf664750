//! Local task routing support.
//!
//! - `heuristic`: keyword/length classifier used when the remote classifier
//!   is unavailable.
//! - `circuit_breaker`: consecutive-failure breaker guarding remote calls.
//!
//! # Complexity → strategy
//!
//! ```text
//! Complexity | Strategy
//! -----------|-----------
//! Simple     | SingleShot
//! Medium     | Iterative
//! Complex    | MultiAgent
//! Epic       | MultiAgent
//! ```

pub mod circuit_breaker;
pub mod heuristic;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use heuristic::{
    suggested_strategy_for, ClassificationResult, HeuristicClassifier, HEURISTIC_CLASSIFIER,
};
