//! Extract code changes from LLM responses.
//!
//! The generation prompts ask for each file as a `FILE: <path>` line followed
//! by a fenced code block:
//!
//! ````text
//! FILE: src/lib.rs
//! ```rust
//! pub fn add(a: i32, b: i32) -> i32 { a + b }
//! ```
//! ````
//!
//! Markers and blocks are paired positionally. When their counts disagree
//! only `min(markers, blocks)` changes are produced so a path is never paired
//! with content that was not meant for it.
//!
//! Matching uses the `regex` crate (finite automata, linear in input size) and
//! is additionally bounded by an input-size cap and a wall-clock deadline
//! checked between matches. Hitting either limit yields zero changes.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::changes::{ChangeType, CodeChange};
use crate::context::language_for_path;

static FILE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:\*\*)?FILE:[ \t]*`?([^\s`*]+)`?")
        .expect("FILE_MARKER regex should compile")
});

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*```([\w+#.-]*)[ \t]*\r?\n(.*?)^[ \t]*```")
        .expect("CODE_BLOCK regex should compile")
});

/// Bounds applied to a single parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserLimits {
    /// Wall-clock budget for the whole parse.
    pub match_timeout: Duration,
    /// Responses larger than this are not scanned at all.
    pub max_input_bytes: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            match_timeout: Duration::from_millis(500),
            max_input_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Why a parse stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseAbort {
    DeadlineExceeded,
    InputTooLarge,
}

/// Changes extracted from one response plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub changes: Vec<CodeChange>,
    pub markers: usize,
    pub blocks: usize,
    pub aborted: Option<ParseAbort>,
}

impl ParsedResponse {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count_mismatch(&self) -> bool {
        self.markers != self.blocks
    }

    fn aborted(reason: ParseAbort) -> Self {
        Self {
            aborted: Some(reason),
            ..Default::default()
        }
    }
}

/// Parse `response` into code changes.
///
/// Paths listed in `existing_paths` become `Modify` changes, all others `Create`.
pub fn parse_code_changes(
    response: &str,
    existing_paths: &[String],
    limits: &ParserLimits,
) -> ParsedResponse {
    if response.len() > limits.max_input_bytes {
        tracing::warn!(
            bytes = response.len(),
            limit = limits.max_input_bytes,
            "response too large to parse"
        );
        return ParsedResponse::aborted(ParseAbort::InputTooLarge);
    }

    let deadline = Instant::now() + limits.match_timeout;

    let mut paths = Vec::new();
    for caps in FILE_MARKER.captures_iter(response) {
        if Instant::now() >= deadline {
            tracing::warn!("FILE marker scan exceeded match timeout");
            return ParsedResponse::aborted(ParseAbort::DeadlineExceeded);
        }
        paths.push(caps[1].to_string());
    }

    let mut blocks = Vec::new();
    for caps in CODE_BLOCK.captures_iter(response) {
        if Instant::now() >= deadline {
            tracing::warn!("code block scan exceeded match timeout");
            return ParsedResponse::aborted(ParseAbort::DeadlineExceeded);
        }
        let info = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        blocks.push((info.to_string(), body.to_string()));
    }

    let markers = paths.len();
    let block_count = blocks.len();
    if markers != block_count {
        tracing::warn!(
            markers,
            blocks = block_count,
            "FILE marker and code block counts differ; using the smaller"
        );
    }

    let changes = paths
        .into_iter()
        .zip(blocks)
        .map(|(path, (info, body))| {
            let language = if info.is_empty() {
                language_for_path(&path).to_string()
            } else {
                info.to_ascii_lowercase()
            };
            let change_type = if existing_paths.iter().any(|p| p == &path) {
                ChangeType::Modify
            } else {
                ChangeType::Create
            };
            CodeChange::new(path, body, change_type).with_language(language)
        })
        .collect();

    ParsedResponse {
        changes,
        markers,
        blocks: block_count,
        aborted: None,
    }
}
