//! System preambles and prompt builders for every generation role.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes
//! so a response can be traced back to the wording that produced it.

use std::fmt::Write;

use task_coordination::{CodeChange, CodingTask, SubTask, TaskExecutionContext};

pub const PROMPT_VERSION: &str = "1.2.0";

/// Shared output convention. The response parser depends on this wording.
const FILE_CONVENTION: &str = "\
## Output format
For EVERY file you create or change, write a line `FILE: <relative/path>` followed \
immediately by a fenced code block containing the COMPLETE new file content:

FILE: src/example.rs
```rust
// full file content
```

Do not use diffs or ellipses. Paths are relative to the repository root.";

pub fn single_shot_preamble() -> String {
    format!(
        "You are a senior software engineer. Implement the requested change in one \
         response. Keep edits minimal and consistent with the surrounding code.\n\n\
         {FILE_CONVENTION}"
    )
}

pub fn iterative_preamble() -> String {
    format!(
        "You are a senior software engineer working in a feedback loop. After each \
         response your files are validated and any errors are sent back to you. When \
         you receive errors, fix ALL of them and resend every affected file in full.\n\n\
         {FILE_CONVENTION}"
    )
}

pub fn coder_preamble() -> String {
    format!(
        "You are an implementation agent on a team. You receive ONE subtask of a \
         larger plan. Implement only that subtask; other agents handle the rest.\n\n\
         {FILE_CONVENTION}"
    )
}

pub const PLANNER_PREAMBLE: &str = "\
You are a planning agent. Decompose the task into small subtasks that can each be \
implemented by one engineer. Mark a subtask as depending on another only when it \
needs that subtask's output; independent subtasks run in parallel.

Respond with JSON only, no prose:
{\"subtasks\": [{\"id\": \"1\", \"description\": \"...\", \"dependencies\": [], \"files\": [\"src/...\"]}]}";

pub const REVIEWER_PREAMBLE: &str = "\
You are a strict code reviewer. Review the proposed change set for correctness, \
security, and fit with the task. Severity scale: 0 cosmetic, 1 style, 2 minor bug, \
3 significant bug, 4 serious defect, 5 blocking (security hole, data loss, build break).

Respond with JSON only, no prose:
{\"approved\": true|false, \"severity\": 0-5, \"issues\": [\"...\"]}";

pub fn tester_preamble() -> String {
    format!(
        "You are a test engineer. Write focused automated tests for the change set you \
         are given, using the test framework already used by the project. Only output \
         test files.\n\n{FILE_CONVENTION}"
    )
}

// ── Builders ─────────────────────────────────────────────────────────────────

fn push_files(out: &mut String, context: &TaskExecutionContext) {
    if context.relevant_files.is_empty() {
        return;
    }
    out.push_str("\n## Relevant files\n");
    for file in &context.relevant_files {
        let _ = write!(
            out,
            "\nFILE: {}\n```{}\n{}\n```\n",
            file.path,
            file.language,
            file.content.trim_end()
        );
    }
}

fn push_changes(out: &mut String, changes: &[CodeChange]) {
    for change in changes {
        let _ = write!(
            out,
            "\nFILE: {} ({:?})\n```{}\n{}\n```\n",
            change.file_path,
            change.change_type,
            change.language,
            change.content.trim_end()
        );
    }
}

/// Full task prompt: title, description, and every relevant file.
pub fn task_prompt(task: &CodingTask, context: &TaskExecutionContext) -> String {
    let mut out = format!("# Task: {}\n\n{}\n", task.title, task.description.trim());
    if let Some(task_type) = task.task_type {
        let _ = writeln!(out, "\nTask type: {task_type}");
    }
    push_files(&mut out, context);
    out
}

/// Follow-up prompt carrying only the previous round's errors.
pub fn correction_prompt(errors: &[String]) -> String {
    let mut out = String::from(
        "Your previous response did not pass validation. Fix these errors and resend \
         every affected file in full:\n\n",
    );
    for error in errors {
        let _ = writeln!(out, "- {error}");
    }
    out
}

pub fn subtask_prompt(
    task: &CodingTask,
    subtask: &SubTask,
    context: &TaskExecutionContext,
) -> String {
    let mut out = format!(
        "# Overall task: {}\n\n{}\n\n# Your subtask ({})\n\n{}\n",
        task.title,
        task.description.trim(),
        subtask.id,
        subtask.description
    );
    if !subtask.files.is_empty() {
        let _ = writeln!(out, "\nExpected files: {}", subtask.files.join(", "));
    }
    push_files(&mut out, context);
    out
}

pub fn review_prompt(task: &CodingTask, changes: &[CodeChange]) -> String {
    let mut out = format!(
        "# Task: {}\n\n{}\n\n# Proposed changes\n",
        task.title,
        task.description.trim()
    );
    push_changes(&mut out, changes);
    out
}

pub fn test_prompt(
    task: &CodingTask,
    changes: &[CodeChange],
    context: &TaskExecutionContext,
) -> String {
    let mut out = format!(
        "# Task: {}\n\n{}\n\n# Implemented changes\n",
        task.title,
        task.description.trim()
    );
    push_changes(&mut out, changes);
    push_files(&mut out, context);
    out
}
