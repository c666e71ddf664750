//! Code validation contract and a deterministic structural validator.
//!
//! Validators never error: problems are reported as data in
//! [`ValidationResult::errors`] so strategies can feed them back to the model.

use std::collections::HashMap;
use std::iter::Peekable;
use std::path::{Component, Path};
use std::str::Chars;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use task_coordination::{ChangeType, CodeChange};

/// Outcome of validating a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeValidator: Send + Sync {
    async fn validate(&self, changes: &[CodeChange]) -> ValidationResult;
}

/// Languages checked for balanced `()[]{}`.
const DELIMITED_LANGUAGES: &[&str] = &[
    "rust",
    "csharp",
    "typescript",
    "javascript",
    "go",
    "java",
    "kotlin",
    "c",
    "cpp",
    "json",
];

/// Cheap checks that need no toolchain: safe relative paths, non-empty
/// content, one change per path, balanced delimiters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl StructuralValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, changes: &[CodeChange]) -> ValidationResult {
        let mut errors = Vec::new();

        if changes.is_empty() {
            errors.push("change set is empty".to_string());
        }

        for (idx, change) in changes.iter().enumerate() {
            let path = change.file_path.trim();
            if path.is_empty() {
                errors.push(format!("change #{} has an empty file path", idx + 1));
                continue;
            }
            if escapes_root(path) {
                errors.push(format!("{path}: path must be relative to the repository root"));
            }
            if change.change_type != ChangeType::Delete && change.content.trim().is_empty() {
                errors.push(format!("{path}: empty content"));
            }
            if DELIMITED_LANGUAGES.contains(&change.language.as_str()) {
                if let Err(msg) = check_delimiters(&change.content, &change.language) {
                    errors.push(format!("{path}: {msg}"));
                }
            }
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for change in changes {
            *counts.entry(change.file_path.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<_> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
        duplicates.sort();
        for (path, n) in duplicates {
            errors.push(format!("{path}: changed {n} times in one change set"));
        }

        ValidationResult::from_errors(errors)
    }
}

#[async_trait]
impl CodeValidator for StructuralValidator {
    async fn validate(&self, changes: &[CodeChange]) -> ValidationResult {
        let result = self.check(changes);
        if !result.success {
            tracing::debug!(errors = result.errors.len(), "structural validation failed");
        }
        result
    }
}

fn escapes_root(path: &str) -> bool {
    let p = Path::new(path);
    path.starts_with('/')
        || path.starts_with('\\')
        || p.is_absolute()
        || path.chars().nth(1) == Some(':')
        || p.components().any(|c| matches!(c, Component::ParentDir))
}

/// Scan for unbalanced `()[]{}`, skipping string and char literals and
/// comments. `language` decides what a quote opens.
fn check_delimiters(source: &str, language: &str) -> Result<(), String> {
    let single_quoted_strings = matches!(language, "javascript" | "typescript");
    let backtick_strings = matches!(language, "javascript" | "typescript" | "go");
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            '"' => skip_quoted(&mut chars, '"', true, &mut line),
            '\'' if single_quoted_strings => skip_quoted(&mut chars, '\'', true, &mut line),
            '\'' => skip_char_literal(&mut chars),
            // Go raw strings have no escapes.
            '`' if backtick_strings => skip_quoted(&mut chars, '`', language != "go", &mut line),
            '/' if chars.peek() == Some(&'/') => {
                for s in chars.by_ref() {
                    if s == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for s in chars.by_ref() {
                    if s == '\n' {
                        line += 1;
                    }
                    if prev == '*' && s == '/' {
                        break;
                    }
                    prev = s;
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, at)) => {
                        return Err(format!(
                            "line {line}: '{c}' closes '{open}' opened on line {at}"
                        ));
                    }
                    None => return Err(format!("line {line}: unmatched '{c}'")),
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, at)) => Err(format!("unclosed '{open}' opened on line {at}")),
        None => Ok(()),
    }
}

/// Consume up to and including `close`; the opening quote was already read.
fn skip_quoted(chars: &mut Peekable<Chars<'_>>, close: char, escapes: bool, line: &mut usize) {
    while let Some(s) = chars.next() {
        match s {
            '\\' if escapes => {
                if chars.next() == Some('\n') {
                    *line += 1;
                }
            }
            '\n' => *line += 1,
            s if s == close => break,
            _ => {}
        }
    }
}

/// Consume a char literal (`'x'`, `'\n'`, `'\u{7FFF}'`) whose opening quote
/// was already read. Lifetimes and loop labels (`'a`) are left in place.
fn skip_char_literal(chars: &mut Peekable<Chars<'_>>) {
    let mut ahead = chars.clone();
    match ahead.next() {
        Some('\\') => {
            ahead.next();
            for _ in 0..MAX_ESCAPE_LEN {
                match ahead.next() {
                    Some('\'') => {
                        *chars = ahead;
                        return;
                    }
                    Some('\n') | None => return,
                    _ => {}
                }
            }
        }
        Some(c) if c != '\n' && c != '\'' => {
            if ahead.next() == Some('\'') {
                *chars = ahead;
            }
        }
        _ => {}
    }
}

/// Chars scanned past the escaped one, enough for `'\u{10FFFF}'`.
const MAX_ESCAPE_LEN: usize = 10;
