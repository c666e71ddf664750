//! End-to-end lifecycle through `TaskEngine::run` with in-process fakes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    agent_set, file_block, CoderScript, FakeCoder, FakePlanner, FakeReviewer, FakeTester,
    ScriptedLlm, ScriptedValidator,
};
use task_coordination::{CodingTask, FailureKind, TaskComplexity, TaskExecutionContext, TaskStatus};
use task_engine::{
    EngineConfig, EngineError, SelectionError, StrategyRegistry, StrategySelector, TaskEngine,
};
use tokio_util::sync::CancellationToken;

fn engine(
    llm: Arc<ScriptedLlm>,
    validator: Arc<ScriptedValidator>,
    planner: FakePlanner,
) -> TaskEngine {
    let agents = agent_set(
        planner,
        Arc::new(FakeCoder::new().on("1", CoderScript::Changes(Vec::new()))),
        FakeReviewer::approving(),
        FakeTester::producing(Vec::new()),
    );
    let registry = StrategyRegistry::standard(&EngineConfig::default(), llm, validator, agents);
    TaskEngine::new(StrategySelector::new(registry))
}

fn simple_task() -> CodingTask {
    CodingTask::new("Typo", "Fix typo in the README header")
}

fn statuses(task: &CodingTask) -> Vec<(TaskStatus, TaskStatus)> {
    task.transitions().iter().map(|t| (t.from, t.to)).collect()
}

#[tokio::test]
async fn successful_run_completes_the_task() {
    let llm = Arc::new(ScriptedLlm::new().reply(file_block("README.md", "# Title"), 40, 0.004));
    let engine = engine(llm.clone(), Arc::new(ScriptedValidator::passing()), FakePlanner::json(""));
    let mut task = simple_task();

    let result = engine
        .run(&mut task, &mut TaskExecutionContext::default(), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.strategy, "SingleShot");
    assert_eq!(task.status(), TaskStatus::Completed);
    assert_eq!(task.complexity, Some(TaskComplexity::Simple));
    assert_eq!(
        statuses(&task),
        vec![
            (TaskStatus::Pending, TaskStatus::InProgress),
            (TaskStatus::InProgress, TaskStatus::Completed),
        ]
    );
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn failed_run_records_the_first_error() {
    let llm = Arc::new(ScriptedLlm::new().reply("Sorry, I cannot help.", 5, 0.0));
    let engine = engine(llm, Arc::new(ScriptedValidator::passing()), FakePlanner::json(""));
    let mut task = simple_task();

    let result = engine
        .run(&mut task, &mut TaskExecutionContext::default(), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.failure, Some(FailureKind::Parse));
    assert_eq!(task.status(), TaskStatus::Failed);
    let last = task.transitions().last().unwrap();
    assert_eq!(last.reason.as_deref(), Some(result.errors[0].as_str()));
}

#[tokio::test]
async fn manual_override_skips_classification() {
    let llm = Arc::new(ScriptedLlm::new().reply(file_block("README.md", "# Title"), 10, 0.0));
    let engine = engine(llm, Arc::new(ScriptedValidator::passing()), FakePlanner::json(""));
    let mut task = simple_task();

    let result = engine
        .run(
            &mut task,
            &mut TaskExecutionContext::default(),
            Some("iterative"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.strategy, "Iterative");
    assert!(!task.is_classified());
    assert_eq!(task.status(), TaskStatus::Completed);
}

#[tokio::test]
async fn unknown_override_leaves_the_task_pending() {
    let llm = Arc::new(ScriptedLlm::new());
    let engine = engine(llm.clone(), Arc::new(ScriptedValidator::passing()), FakePlanner::json(""));
    let mut task = simple_task();

    let err = engine
        .run(
            &mut task,
            &mut TaskExecutionContext::default(),
            Some("Telepathy"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        EngineError::Selection(SelectionError::UnknownStrategy { name, available }) => {
            assert_eq!(name, "Telepathy");
            assert_eq!(available, vec!["SingleShot", "Iterative", "MultiAgent"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(task.status(), TaskStatus::Pending);
    assert!(task.transitions().is_empty());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn cancelled_token_before_start_cancels_the_task() {
    let llm = Arc::new(ScriptedLlm::new());
    let engine = engine(llm.clone(), Arc::new(ScriptedValidator::passing()), FakePlanner::json(""));
    let mut task = simple_task();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .run(&mut task, &mut TaskExecutionContext::default(), None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::CancelledBeforeStart));
    assert_eq!(task.status(), TaskStatus::Cancelled);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_cancels_the_task() {
    let llm = Arc::new(ScriptedLlm::new().reply_after(
        Duration::from_secs(20),
        file_block("README.md", "# Title"),
        10,
        0.0,
    ));
    let engine = engine(llm, Arc::new(ScriptedValidator::passing()), FakePlanner::json(""));
    let mut task = simple_task();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = engine
        .run(&mut task, &mut TaskExecutionContext::default(), None, &cancel)
        .await
        .unwrap();

    assert!(result.is_cancelled());
    assert_eq!(task.status(), TaskStatus::Cancelled);
    assert_eq!(
        statuses(&task),
        vec![
            (TaskStatus::Pending, TaskStatus::InProgress),
            (TaskStatus::InProgress, TaskStatus::Cancelled),
        ]
    );
}

#[tokio::test]
async fn panicking_agent_fails_the_task_as_internal() {
    let engine = engine(
        Arc::new(ScriptedLlm::new()),
        Arc::new(ScriptedValidator::passing()),
        FakePlanner::panicking(),
    );
    let mut task = simple_task();

    let result = engine
        .run(
            &mut task,
            &mut TaskExecutionContext::default(),
            Some("multi-agent"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.failure, Some(FailureKind::Internal));
    assert!(result.errors[0].contains("planner exploded"));
    assert_eq!(task.status(), TaskStatus::Failed);
}

#[tokio::test]
async fn epic_description_routes_to_multi_agent() {
    let engine = engine(
        Arc::new(ScriptedLlm::new()),
        Arc::new(ScriptedValidator::passing()),
        FakePlanner::json("no plan today"),
    );
    let mut task = CodingTask::new("Platform", "Epic: multi-service billing overhaul");

    let result = engine
        .run(&mut task, &mut TaskExecutionContext::default(), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.strategy, "MultiAgent");
    assert_eq!(result.failure, Some(FailureKind::Plan));
    assert_eq!(task.complexity, Some(TaskComplexity::Epic));
    assert_eq!(task.status(), TaskStatus::Failed);
}
