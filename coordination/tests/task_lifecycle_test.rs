//! Integration tests for the task lifecycle.
//!
//! Drives `CodingTask` through every legal path of the status graph and
//! checks that the transition log, classification guard and serialized form
//! agree with each other.

use task_coordination::{
    CodingTask, HeuristicClassifier, TaskComplexity, TaskError, TaskStatus, TaskType,
};

fn classified_task() -> CodingTask {
    let mut task = CodingTask::new("Login crash", "Fix the crash when login fails");
    let verdict = HeuristicClassifier::new().classify(&task.description);
    task.classify(verdict.task_type, verdict.complexity).unwrap();
    task
}

/// Test: Heuristic classification feeds the task and the happy path completes
#[test]
fn test_classified_task_completes() {
    let mut task = classified_task();
    assert!(task.is_classified());
    assert_eq!(task.task_type, Some(TaskType::BugFix));
    assert_eq!(task.complexity, Some(TaskComplexity::Simple));

    task.start().unwrap();
    task.complete().unwrap();

    assert_eq!(task.status(), TaskStatus::Completed);
    let log: Vec<_> = task.transitions().iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        log,
        vec![
            (TaskStatus::Pending, TaskStatus::InProgress),
            (TaskStatus::InProgress, TaskStatus::Completed),
        ]
    );
    assert!(task.updated_at >= task.created_at);
}

/// Test: Failure reasons are kept on the transition record
#[test]
fn test_failure_reason_recorded() {
    let mut task = classified_task();
    task.start().unwrap();
    task.fail("Iterative timed out after 60s").unwrap();

    let last = task.transitions().last().unwrap();
    assert_eq!(last.to, TaskStatus::Failed);
    assert_eq!(last.reason.as_deref(), Some("Iterative timed out after 60s"));
}

/// Test: A pending task can be cancelled directly
#[test]
fn test_cancel_from_pending() {
    let mut task = CodingTask::new("t", "d");
    task.cancel("caller gave up").unwrap();
    assert_eq!(task.status(), TaskStatus::Cancelled);
    assert_eq!(task.transitions().len(), 1);
}

/// Test: Terminal states reject every further transition and leave the log untouched
#[test]
fn test_terminal_states_are_final() {
    let mut task = classified_task();
    task.start().unwrap();
    task.complete().unwrap();

    assert!(matches!(
        task.start(),
        Err(TaskError::IllegalTransition {
            from: TaskStatus::Completed,
            to: TaskStatus::InProgress
        })
    ));
    assert!(task.fail("late").is_err());
    assert!(task.cancel("late").is_err());
    assert_eq!(task.transitions().len(), 2);
    assert_eq!(task.status(), TaskStatus::Completed);
}

/// Test: Skipping InProgress is not allowed
#[test]
fn test_pending_cannot_complete_or_fail() {
    let mut task = CodingTask::new("t", "d");
    assert!(task.complete().is_err());
    assert!(task.fail("nope").is_err());
    assert_eq!(task.status(), TaskStatus::Pending);
    assert!(task.transitions().is_empty());
}

/// Test: Classification is only legal while pending
#[test]
fn test_classification_locked_after_start() {
    let mut task = classified_task();
    task.start().unwrap();

    let err = task
        .classify(TaskType::Refactor, TaskComplexity::Epic)
        .unwrap_err();
    assert!(matches!(
        err,
        TaskError::ClassifyNotAllowed {
            status: TaskStatus::InProgress,
            ..
        }
    ));
    assert_eq!(task.complexity, Some(TaskComplexity::Simple));
}

/// Test: The transition log survives a JSON round trip with snake_case statuses
#[test]
fn test_task_serializes_status_and_log() {
    let mut task = classified_task();
    task.start().unwrap();

    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["status"], "in_progress");
    assert_eq!(json["transitions"][0]["to"], "in_progress");

    let back: CodingTask = serde_json::from_value(json).unwrap();
    assert_eq!(back.status(), TaskStatus::InProgress);
    assert_eq!(back.transitions().len(), 1);
    assert_eq!(back.id, task.id);
}
