//! Per-attempt execution context threaded through a strategy run.

use serde::{Deserialize, Serialize};

use crate::changes::CodeChange;

/// A source file supplied by the caller as generation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantFile {
    pub path: String,
    pub content: String,
    pub language: String,
}

impl RelevantFile {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            language: language.into(),
        }
    }

    /// Build a file, inferring the language from its extension.
    pub fn infer(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = language_for_path(&path).to_string();
        Self {
            path,
            content: content.into(),
            language,
        }
    }
}

/// Mutable working set for a single execution attempt.
///
/// Owned by exactly one strategy run; iterations mutate it in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskExecutionContext {
    pub relevant_files: Vec<RelevantFile>,
    /// Errors from the most recent validation pass.
    pub validation_errors: Vec<String>,
    /// Zero-based iteration currently executing.
    pub current_iteration: u32,
}

impl TaskExecutionContext {
    pub fn new(relevant_files: Vec<RelevantFile>) -> Self {
        Self {
            relevant_files,
            validation_errors: Vec::new(),
            current_iteration: 0,
        }
    }

    /// Replace (not append) the validation errors carried into the next iteration.
    pub fn replace_errors(&mut self, errors: Vec<String>) {
        self.validation_errors = errors;
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.relevant_files.iter().map(|f| f.path.clone()).collect()
    }

    /// A copy of this context with `changes` layered over the relevant files.
    ///
    /// Used to hand work completed earlier in a run to later dependents.
    pub fn with_changes(&self, changes: &[CodeChange]) -> Self {
        let mut next = self.clone();
        for change in changes {
            let file = RelevantFile::new(
                change.file_path.clone(),
                change.content.clone(),
                change.language.clone(),
            );
            match next
                .relevant_files
                .iter_mut()
                .find(|f| f.path == change.file_path)
            {
                Some(existing) => *existing = file,
                None => next.relevant_files.push(file),
            }
        }
        next
    }
}

/// Map a file extension to a language tag.
pub fn language_for_path(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "cs" => "csharp",
        "py" => "python",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "sh" => "bash",
        _ => "text",
    }
}
