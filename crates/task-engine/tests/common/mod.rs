//! In-process fakes for the engine's collaborators.
//!
//! Each fake records what it was asked so tests can assert on prompts and
//! call counts without a running model or classifier service.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use task_coordination::{
    AgentResult, ChangeType, CodeChange, CodingTask, SubTask, TaskExecutionContext,
};
use task_engine::agents::{
    AgentError, AgentSet, CoderAgent, PlannerAgent, ReviewerAgent, TesterAgent,
};
use task_engine::llm::{LlmClient, LlmError, LlmRequest, LlmResponse};
use task_engine::validator::{CodeValidator, ValidationResult};

// ── Helpers ──────────────────────────────────────────────────────────────────

pub fn file_block(path: &str, content: &str) -> String {
    format!("FILE: {path}\n```\n{content}\n```\n")
}

pub fn response(content: impl Into<String>, tokens: u64, cost: f64) -> LlmResponse {
    LlmResponse {
        content: content.into(),
        tokens_used: tokens,
        cost_usd: cost,
        model: "fake".to_string(),
    }
}

pub fn change(path: &str, content: &str) -> CodeChange {
    CodeChange::new(path, content, ChangeType::Create)
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// Replays scripted replies in order, each after an optional delay.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<(Duration, Result<LlmResponse, LlmError>)>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, content: impl Into<String>, tokens: u64, cost: f64) -> Self {
        self.reply_after(Duration::ZERO, content, tokens, cost)
    }

    pub fn reply_after(
        self,
        delay: Duration,
        content: impl Into<String>,
        tokens: u64,
        cost: f64,
    ) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((delay, Ok(response(content, tokens, cost))));
        self
    }

    pub fn fail(self, error: LlmError) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back((Duration::ZERO, Err(error)));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        let (delay, reply) = next.expect("ScriptedLlm ran out of replies");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

// ── Validator ────────────────────────────────────────────────────────────────

/// Returns scripted verdicts in order, then passes everything.
#[derive(Default)]
pub struct ScriptedValidator {
    verdicts: Mutex<VecDeque<ValidationResult>>,
    seen: Mutex<Vec<Vec<CodeChange>>>,
}

impl ScriptedValidator {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn then_fail(self, errors: &[&str]) -> Self {
        self.verdicts.lock().unwrap().push_back(ValidationResult {
            success: false,
            errors: errors.iter().map(|e| e.to_string()).collect(),
        });
        self
    }

    pub fn then_pass(self) -> Self {
        self.verdicts.lock().unwrap().push_back(ValidationResult::ok());
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_seen(&self) -> Vec<CodeChange> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CodeValidator for ScriptedValidator {
    async fn validate(&self, changes: &[CodeChange]) -> ValidationResult {
        self.seen.lock().unwrap().push(changes.to_vec());
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ValidationResult::ok)
    }
}

// ── Agents ───────────────────────────────────────────────────────────────────

pub struct FakePlanner {
    pub output: String,
    pub tokens: u64,
    pub cost: f64,
    pub panic: bool,
}

impl FakePlanner {
    pub fn json(output: &str) -> Self {
        Self {
            output: output.to_string(),
            tokens: 100,
            cost: 0.01,
            panic: false,
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::json("")
        }
    }
}

#[async_trait]
impl PlannerAgent for FakePlanner {
    async fn plan(
        &self,
        _task: &CodingTask,
        _context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError> {
        if self.panic {
            panic!("planner exploded");
        }
        Ok(AgentResult::succeeded("planner", self.output.clone()).with_spend(self.tokens, self.cost))
    }
}

/// Behaviour of [`FakeCoder`] for one subtask id.
#[derive(Clone)]
pub enum CoderScript {
    Changes(Vec<CodeChange>),
    Unsuccessful(String),
    Fault(String),
}

#[derive(Default)]
pub struct FakeCoder {
    scripts: HashMap<String, (Duration, CoderScript)>,
    /// Subtask id → paths visible in the context it received.
    pub seen_files: Mutex<HashMap<String, Vec<String>>>,
    pub tokens_per_call: u64,
}

impl FakeCoder {
    pub fn new() -> Self {
        Self {
            tokens_per_call: 50,
            ..Default::default()
        }
    }

    pub fn on(mut self, subtask: &str, script: CoderScript) -> Self {
        self.scripts
            .insert(subtask.to_string(), (Duration::ZERO, script));
        self
    }

    pub fn on_after(mut self, subtask: &str, delay: Duration, script: CoderScript) -> Self {
        self.scripts.insert(subtask.to_string(), (delay, script));
        self
    }

    pub fn seen(&self, subtask: &str) -> Vec<String> {
        self.seen_files
            .lock()
            .unwrap()
            .get(subtask)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CoderAgent for FakeCoder {
    async fn implement(
        &self,
        _task: &CodingTask,
        subtask: &SubTask,
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError> {
        self.seen_files
            .lock()
            .unwrap()
            .insert(subtask.id.clone(), context.file_paths());

        let (delay, script) = self
            .scripts
            .get(&subtask.id)
            .cloned()
            .unwrap_or((Duration::ZERO, CoderScript::Changes(Vec::new())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let name = format!("coder:{}", subtask.id);
        match script {
            CoderScript::Changes(changes) => Ok(AgentResult::succeeded(name, "")
                .with_changes(changes)
                .with_spend(self.tokens_per_call, 0.005)),
            CoderScript::Unsuccessful(error) => {
                Ok(AgentResult::failed(name, error).with_spend(self.tokens_per_call, 0.005))
            }
            CoderScript::Fault(message) => Err(AgentError::fault(name, message)),
        }
    }
}

pub enum ReviewScript {
    Output(String),
    Fault,
    Panic,
}

pub struct FakeReviewer {
    script: ReviewScript,
    pub seen: Mutex<Vec<CodeChange>>,
}

impl FakeReviewer {
    pub fn approving() -> Self {
        Self::output(r#"{"approved": true, "severity": 0, "issues": []}"#)
    }

    pub fn rejecting(severity: u8, issue: &str) -> Self {
        Self::output(&format!(
            r#"{{"approved": false, "severity": {severity}, "issues": ["{issue}"]}}"#
        ))
    }

    pub fn output(raw: &str) -> Self {
        Self {
            script: ReviewScript::Output(raw.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn faulty() -> Self {
        Self {
            script: ReviewScript::Fault,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn panicking() -> Self {
        Self {
            script: ReviewScript::Panic,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ReviewerAgent for FakeReviewer {
    async fn review(
        &self,
        _task: &CodingTask,
        changes: &[CodeChange],
    ) -> Result<AgentResult, AgentError> {
        *self.seen.lock().unwrap() = changes.to_vec();
        match &self.script {
            ReviewScript::Output(raw) => {
                Ok(AgentResult::succeeded("reviewer", raw.clone()).with_spend(30, 0.003))
            }
            ReviewScript::Fault => Err(AgentError::fault("reviewer", "connection reset")),
            ReviewScript::Panic => panic!("reviewer exploded"),
        }
    }
}

pub enum TesterScript {
    Tests(Vec<CodeChange>),
    Fault,
    Panic,
}

pub struct FakeTester {
    script: TesterScript,
}

impl FakeTester {
    pub fn producing(tests: Vec<CodeChange>) -> Self {
        Self {
            script: TesterScript::Tests(tests),
        }
    }

    pub fn faulty() -> Self {
        Self {
            script: TesterScript::Fault,
        }
    }

    pub fn panicking() -> Self {
        Self {
            script: TesterScript::Panic,
        }
    }
}

#[async_trait]
impl TesterAgent for FakeTester {
    async fn generate_tests(
        &self,
        _task: &CodingTask,
        _changes: &[CodeChange],
        _context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError> {
        match &self.script {
            TesterScript::Tests(tests) => Ok(AgentResult::succeeded("tester", "")
                .with_changes(tests.clone())
                .with_spend(40, 0.004)),
            TesterScript::Fault => Err(AgentError::fault("tester", "test generation crashed")),
            TesterScript::Panic => panic!("tester exploded"),
        }
    }
}

pub fn agent_set(
    planner: FakePlanner,
    coder: Arc<FakeCoder>,
    reviewer: FakeReviewer,
    tester: FakeTester,
) -> AgentSet {
    AgentSet::new(
        Arc::new(planner),
        coder,
        Arc::new(reviewer),
        Arc::new(tester),
    )
}
