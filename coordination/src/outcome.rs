//! Result value objects: agent results, review verdicts, and the final
//! strategy execution result together with the spend ledger that builds it.
//!
//! ## Key types
//!
//! | Type                      | Produced by                | Consumed by          |
//! |---------------------------|----------------------------|----------------------|
//! | `AgentResult`             | planner/coder/reviewer/tester | multi-agent strategy |
//! | `ReviewResult`            | reviewer output parser     | review gate          |
//! | `SpendLedger`             | every strategy run         | result construction  |
//! | `StrategyExecutionResult` | `SpendLedger::{succeed,fail}` | engine caller     |

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::changes::CodeChange;

// ── Agent results ────────────────────────────────────────────────────────────

/// Outcome of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub success: bool,
    /// Raw agent output (plan JSON, review JSON, prose).
    pub output: String,
    pub changes: Vec<CodeChange>,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub errors: Vec<String>,
}

impl AgentResult {
    pub fn succeeded(agent_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: true,
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn failed(agent_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    pub fn with_changes(mut self, changes: Vec<CodeChange>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_spend(mut self, tokens_used: u64, cost_usd: f64) -> Self {
        self.tokens_used = tokens_used;
        self.cost_usd = cost_usd;
        self
    }
}

// ── Review ───────────────────────────────────────────────────────────────────

/// Highest severity a reviewer may report.
pub const MAX_REVIEW_SEVERITY: u8 = 5;

/// Reviewer verdict over a merged change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub approved: bool,
    /// 0 (cosmetic) to 5 (blocking). Any JSON number is accepted, rounded
    /// and clamped.
    #[serde(default, deserialize_with = "severity_from_number")]
    pub severity: u8,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl ReviewResult {
    /// Parse reviewer JSON output. Returns `None` when no verdict can be read.
    pub fn parse(raw: &str) -> Option<Self> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str(&raw[start..=end]).ok()
    }

    /// Whether this verdict blocks the run at the given severity threshold.
    pub fn rejects_at(&self, threshold: u8) -> bool {
        !self.approved && self.severity >= threshold
    }
}

fn severity_from_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Err(serde::de::Error::custom("severity is NaN"));
    }
    Ok(raw.round().clamp(0.0, f64::from(MAX_REVIEW_SEVERITY)) as u8)
}

// ── Failure taxonomy ─────────────────────────────────────────────────────────

/// Machine-readable reason a strategy run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Wall-clock budget exceeded.
    Timeout,
    /// Caller cancelled the run.
    Cancelled,
    /// LLM call errored (transport, rate limit, API error).
    Generation,
    /// Response did not follow the expected file/code-block convention.
    Parse,
    /// Validator reported errors.
    Validation,
    /// Planner output empty or unparseable.
    Plan,
    /// No coder produced any change.
    NoChanges,
    /// Reviewer rejected the change set above the severity threshold.
    ReviewRejected,
    /// An agent faulted unexpectedly.
    Agent,
    /// Panic or other unexpected fault inside the engine.
    Internal,
}

impl FailureKind {
    /// Whether the run was interrupted rather than failing on its own.
    pub fn is_interruption(self) -> bool {
        matches!(self, Self::Timeout | Self::Cancelled)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Generation => write!(f, "generation"),
            Self::Parse => write!(f, "parse"),
            Self::Validation => write!(f, "validation"),
            Self::Plan => write!(f, "plan"),
            Self::NoChanges => write!(f, "no_changes"),
            Self::ReviewRejected => write!(f, "review_rejected"),
            Self::Agent => write!(f, "agent"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

// ── Strategy result ──────────────────────────────────────────────────────────

/// Outcome of one full strategy run. Built once by [`SpendLedger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyExecutionResult {
    pub strategy: String,
    pub success: bool,
    pub changes: Vec<CodeChange>,
    pub total_tokens_used: u64,
    pub total_cost_usd: f64,
    pub duration: Duration,
    pub errors: Vec<String>,
    pub iterations_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl StrategyExecutionResult {
    pub fn is_timeout(&self) -> bool {
        self.failure == Some(FailureKind::Timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(FailureKind::Cancelled)
    }
}

/// Running totals for one strategy run.
///
/// Every LLM/agent call that returns is recorded here, success or not, so the
/// final result always reports what was spent. Owned by the orchestrating
/// task only; parallel phases fold their results in after joining. The owner
/// outlives the run itself, so totals survive a run that unwinds.
#[derive(Debug)]
pub struct SpendLedger {
    strategy: String,
    started: Instant,
    tokens: u64,
    cost_usd: f64,
    calls: u32,
}

impl SpendLedger {
    pub fn start(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            started: Instant::now(),
            tokens: 0,
            cost_usd: 0.0,
            calls: 0,
        }
    }

    pub fn record(&mut self, tokens: u64, cost_usd: f64) {
        self.tokens += tokens;
        self.cost_usd += cost_usd;
        self.calls += 1;
    }

    pub fn record_agent(&mut self, result: &AgentResult) {
        self.record(result.tokens_used, result.cost_usd);
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_usd
    }

    /// Number of calls recorded so far.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn succeed(&self, changes: Vec<CodeChange>, iterations_used: u32) -> StrategyExecutionResult {
        StrategyExecutionResult {
            duration: self.started.elapsed(),
            strategy: self.strategy.clone(),
            success: true,
            changes,
            total_tokens_used: self.tokens,
            total_cost_usd: self.cost_usd,
            errors: Vec::new(),
            iterations_used,
            failure: None,
        }
    }

    pub fn fail(
        &self,
        kind: FailureKind,
        errors: Vec<String>,
        iterations_used: u32,
    ) -> StrategyExecutionResult {
        StrategyExecutionResult {
            duration: self.started.elapsed(),
            strategy: self.strategy.clone(),
            success: false,
            changes: Vec::new(),
            total_tokens_used: self.tokens,
            total_cost_usd: self.cost_usd,
            errors,
            iterations_used,
            failure: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_parses_json_with_prose() {
        let raw = "Review:\n{\"approved\": false, \"severity\": 4, \"issues\": [\"sql injection\"]}";
        let review = ReviewResult::parse(raw).unwrap();
        assert!(!review.approved);
        assert_eq!(review.severity, 4);
        assert_eq!(review.issues, vec!["sql injection".to_string()]);
    }

    #[test]
    fn review_severity_is_clamped() {
        let review = ReviewResult::parse(r#"{"approved": false, "severity": 9}"#).unwrap();
        assert_eq!(review.severity, MAX_REVIEW_SEVERITY);
    }

    #[test]
    fn review_severity_accepts_any_number() {
        for raw in [
            r#"{"approved": false, "severity": 4.0}"#,
            r#"{"approved": false, "severity": 300}"#,
            r#"{"approved": false, "severity": 3.6}"#,
        ] {
            let review = ReviewResult::parse(raw).unwrap();
            assert!(review.rejects_at(4), "{raw}");
        }
        let high = ReviewResult::parse(r#"{"approved": false, "severity": 300}"#).unwrap();
        assert_eq!(high.severity, MAX_REVIEW_SEVERITY);
        let negative = ReviewResult::parse(r#"{"approved": true, "severity": -2}"#).unwrap();
        assert_eq!(negative.severity, 0);
        let missing = ReviewResult::parse(r#"{"approved": false}"#).unwrap();
        assert_eq!(missing.severity, 0);
    }

    #[test]
    fn ledger_outlives_the_result_it_builds() {
        let mut ledger = SpendLedger::start("multi_agent");
        ledger.record(100, 0.01);
        let first = ledger.fail(FailureKind::Internal, vec!["panicked".into()], 0);
        assert_eq!(first.total_tokens_used, 100);
        assert_eq!(first.strategy, "multi_agent");
        assert_eq!(ledger.tokens(), 100);
    }

    #[test]
    fn review_unparseable_is_none() {
        assert!(ReviewResult::parse("LGTM").is_none());
        assert!(ReviewResult::parse("} nope {").is_none());
    }

    #[test]
    fn review_threshold() {
        let review = ReviewResult {
            approved: false,
            severity: 3,
            issues: vec![],
        };
        assert!(!review.rejects_at(4));
        assert!(review.rejects_at(3));

        let approved = ReviewResult {
            approved: true,
            severity: 5,
            issues: vec![],
        };
        assert!(!approved.rejects_at(4));
    }

    #[test]
    fn ledger_sums_every_call() {
        let mut ledger = SpendLedger::start("iterative");
        ledger.record(100, 0.01);
        ledger.record_agent(&AgentResult::failed("coder", "boom").with_spend(50, 0.005));
        assert_eq!(ledger.calls(), 2);

        let result = ledger.fail(FailureKind::Validation, vec!["bad".into()], 2);
        assert!(!result.success);
        assert_eq!(result.total_tokens_used, 150);
        assert!((result.total_cost_usd - 0.015).abs() < 1e-9);
        assert_eq!(result.failure, Some(FailureKind::Validation));
    }

    #[test]
    fn ledger_success_has_no_failure_kind() {
        let result = SpendLedger::start("single_shot").succeed(vec![], 1);
        assert!(result.success);
        assert!(result.failure.is_none());
        assert_eq!(result.strategy, "single_shot");
    }

    #[test]
    fn interruption_kinds() {
        assert!(FailureKind::Timeout.is_interruption());
        assert!(FailureKind::Cancelled.is_interruption());
        assert!(!FailureKind::Generation.is_interruption());
    }
}
