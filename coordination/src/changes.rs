//! Proposed file changes and last-write-wins conflict resolution.
//!
//! Several coders may touch the same path during a multi-agent run. The
//! merge keeps only the last change produced for each path and reports every
//! conflict so callers can log it. Output order follows the first appearance
//! of each path, which keeps the merged set stable across runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::context::language_for_path;

/// What a change does to its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Create,
    Modify,
    Delete,
}

/// A proposed create/modify/delete of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeChange {
    pub file_path: String,
    pub content: String,
    pub language: String,
    pub change_type: ChangeType,
}

impl CodeChange {
    pub fn new(
        file_path: impl Into<String>,
        content: impl Into<String>,
        change_type: ChangeType,
    ) -> Self {
        let file_path = file_path.into();
        let language = language_for_path(&file_path).to_string();
        Self {
            file_path,
            content: content.into(),
            language,
            change_type,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// A path that received more than one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub file_path: String,
    /// Number of changes that competed for the path (always ≥ 2).
    pub competing: usize,
}

/// Output of [`merge_last_write_wins`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub changes: Vec<CodeChange>,
    pub conflicts: Vec<MergeConflict>,
}

/// Collapse `changes` to one change per path, keeping the last one.
pub fn merge_last_write_wins(changes: Vec<CodeChange>) -> MergeReport {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut merged: Vec<CodeChange> = Vec::new();

    for change in changes {
        match slots.get(&change.file_path) {
            Some(&idx) => {
                counts[idx] += 1;
                merged[idx] = change;
            }
            None => {
                slots.insert(change.file_path.clone(), merged.len());
                counts.push(1);
                merged.push(change);
            }
        }
    }

    let conflicts = merged
        .iter()
        .zip(&counts)
        .filter(|(_, n)| **n > 1)
        .map(|(change, n)| MergeConflict {
            file_path: change.file_path.clone(),
            competing: *n,
        })
        .collect();

    MergeReport {
        changes: merged,
        conflicts,
    }
}

/// Layer `overlay` on top of `base`; overlay entries replace base entries by path.
pub fn overlay_changes(base: Vec<CodeChange>, overlay: Vec<CodeChange>) -> MergeReport {
    let mut all = base;
    all.extend(overlay);
    merge_last_write_wins(all)
}
