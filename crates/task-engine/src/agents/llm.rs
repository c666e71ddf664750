//! Agents backed directly by an [`LlmClient`].

use std::sync::Arc;

use async_trait::async_trait;
use task_coordination::{
    parse_code_changes, AgentResult, CodeChange, CodingTask, ParserLimits, SubTask,
    TaskExecutionContext,
};

use super::{AgentError, CoderAgent, PlannerAgent, ReviewerAgent, TesterAgent};
use crate::llm::{ChatMessage, LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::prompts;

/// Generation settings shared by the LLM-backed agents.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub parser: ParserLimits,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.2,
            max_tokens: 4_096,
            parser: ParserLimits::default(),
        }
    }
}

async fn call(
    llm: &dyn LlmClient,
    settings: &AgentSettings,
    system: String,
    prompt: String,
) -> Result<LlmResponse, LlmError> {
    let request = LlmRequest::new(vec![ChatMessage::system(system), ChatMessage::user(prompt)])
        .with_model(settings.model.clone())
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);
    llm.generate(request).await
}

/// A failed generation is an unsuccessful result, not an agent fault.
fn generation_failed(name: impl Into<String>, error: LlmError) -> AgentResult {
    let name = name.into();
    tracing::warn!(agent = %name, error = %error, "generation failed");
    AgentResult::failed(name, format!("generation failed: {error}"))
}

fn changes_result(
    name: String,
    response: LlmResponse,
    existing: &[String],
    parser: &ParserLimits,
) -> AgentResult {
    let parsed = parse_code_changes(&response.content, existing, parser);
    let result = if parsed.is_empty() {
        AgentResult::failed(name, "no code changes found in response")
    } else {
        AgentResult::succeeded(name, String::new()).with_changes(parsed.changes)
    };
    AgentResult {
        output: response.content,
        ..result
    }
    .with_spend(response.tokens_used, response.cost_usd)
}

// ── Planner ──────────────────────────────────────────────────────────────────

pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, settings: AgentSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl PlannerAgent for LlmPlanner {
    async fn plan(
        &self,
        task: &CodingTask,
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError> {
        let response = match call(
            self.llm.as_ref(),
            &self.settings,
            prompts::PLANNER_PREAMBLE.to_string(),
            prompts::task_prompt(task, context),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => return Ok(generation_failed("planner", e)),
        };
        Ok(AgentResult::succeeded("planner", response.content)
            .with_spend(response.tokens_used, response.cost_usd))
    }
}

// ── Coder ────────────────────────────────────────────────────────────────────

pub struct LlmCoder {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
}

impl LlmCoder {
    pub fn new(llm: Arc<dyn LlmClient>, settings: AgentSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl CoderAgent for LlmCoder {
    async fn implement(
        &self,
        task: &CodingTask,
        subtask: &SubTask,
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError> {
        let name = format!("coder:{}", subtask.id);
        let response = match call(
            self.llm.as_ref(),
            &self.settings,
            prompts::coder_preamble(),
            prompts::subtask_prompt(task, subtask, context),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => return Ok(generation_failed(name, e)),
        };
        Ok(changes_result(
            name,
            response,
            &context.file_paths(),
            &self.settings.parser,
        ))
    }
}

// ── Reviewer ─────────────────────────────────────────────────────────────────

pub struct LlmReviewer {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
}

impl LlmReviewer {
    pub fn new(llm: Arc<dyn LlmClient>, settings: AgentSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl ReviewerAgent for LlmReviewer {
    async fn review(
        &self,
        task: &CodingTask,
        changes: &[CodeChange],
    ) -> Result<AgentResult, AgentError> {
        let response = match call(
            self.llm.as_ref(),
            &AgentSettings {
                temperature: 0.0,
                ..self.settings.clone()
            },
            prompts::REVIEWER_PREAMBLE.to_string(),
            prompts::review_prompt(task, changes),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => return Ok(generation_failed("reviewer", e)),
        };
        Ok(AgentResult::succeeded("reviewer", response.content)
            .with_spend(response.tokens_used, response.cost_usd))
    }
}

// ── Tester ───────────────────────────────────────────────────────────────────

pub struct LlmTester {
    llm: Arc<dyn LlmClient>,
    settings: AgentSettings,
}

impl LlmTester {
    pub fn new(llm: Arc<dyn LlmClient>, settings: AgentSettings) -> Self {
        Self { llm, settings }
    }
}

#[async_trait]
impl TesterAgent for LlmTester {
    async fn generate_tests(
        &self,
        task: &CodingTask,
        changes: &[CodeChange],
        context: &TaskExecutionContext,
    ) -> Result<AgentResult, AgentError> {
        let response = match call(
            self.llm.as_ref(),
            &self.settings,
            prompts::tester_preamble(),
            prompts::test_prompt(task, changes, context),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => return Ok(generation_failed("tester", e)),
        };
        let mut existing = context.file_paths();
        existing.extend(changes.iter().map(|c| c.file_path.clone()));
        Ok(changes_result(
            "tester".to_string(),
            response,
            &existing,
            &self.settings.parser,
        ))
    }
}
