//! Task coordination library
//!
//! Deterministic, I/O-free building blocks for the task execution engine:
//! - Coding task entity with a forward-only status state machine
//! - Per-attempt execution context and proposed code changes
//! - Last-write-wins conflict resolution for concurrent edits
//! - Planner output (subtasks with dependencies)
//! - Agent/review/strategy results and the spend ledger
//! - Bounded parser for `FILE:` + fenced-code-block responses
//! - Local heuristic classifier and circuit breaker for remote routing

#![allow(clippy::uninlined_format_args)]

pub mod changes;
pub mod context;
pub mod outcome;
pub mod plan;
pub mod response_parser;
pub mod router;
pub mod status;
pub mod task;

pub use changes::{
    merge_last_write_wins, overlay_changes, ChangeType, CodeChange, MergeConflict, MergeReport,
};
pub use context::{language_for_path, RelevantFile, TaskExecutionContext};
pub use outcome::{
    AgentResult, FailureKind, ReviewResult, SpendLedger, StrategyExecutionResult,
    MAX_REVIEW_SEVERITY,
};
pub use plan::{PlanError, SubTask, TaskPlan};
pub use response_parser::{parse_code_changes, ParseAbort, ParsedResponse, ParserLimits};
pub use router::{ClassificationResult, HeuristicClassifier, HEURISTIC_CLASSIFIER};
pub use status::{TaskStatus, TransitionRecord};
pub use task::{CodingTask, TaskComplexity, TaskError, TaskType};
