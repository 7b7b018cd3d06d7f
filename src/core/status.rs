//! Type-safe file status classification over raw tracking state.
//!
//! The embedded version-control engine reports one [`StatusRow`] per file: a
//! (head, worktree, stage) presence tuple. This module maps each tuple onto
//! the closed [`GitFileStatus`] taxonomy the UI consumes. The mapping is a
//! fixed fourteen-entry table; anything outside the table is a contract
//! change in the engine and fails loudly instead of defaulting.
//!
//! # Public API
//! - [`StatusRow`]: Raw per-file tracking state as produced by the engine
//! - [`GitFileStatus`]: Closed enumeration of the fourteen named states
//! - [`classify`]: The table lookup
//! - Row predicates used by UI filtering: [`is_deleted_in_worktree`],
//!   [`has_unstaged_divergence`], [`differs_from_head`], [`index_matches_head`]

use crate::core::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw per-file tracking state.
///
/// `head` is 0 or 1 (absent from or present in the last commit), `worktree`
/// is 0, 1, or 2 (absent, identical to head, differing from head), `stage`
/// is 0 to 3 (absent, identical to head, identical to worktree, differing
/// from both). Rows are recomputed on demand and never cached across file
/// mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub path: String,
    pub head: u8,
    pub worktree: u8,
    pub stage: u8,
}

impl StatusRow {
    pub fn new(path: impl Into<String>, head: u8, worktree: u8, stage: u8) -> Self {
        Self {
            path: path.into(),
            head,
            worktree,
            stage,
        }
    }

    /// The three flags concatenated into the lookup key, e.g. `121`.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.head, self.worktree, self.stage)
    }
}

/// The closed set of named file states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GitFileStatus {
    /// Not present anywhere
    Absent,
    /// New file, not yet staged
    Untracked,
    /// New file, staged
    Added,
    /// New file, staged, with further unstaged edits
    AddedModified,
    /// New file, staged, then deleted from the worktree
    AddedDeleted,
    /// Identical in head, worktree, and stage
    Unmodified,
    /// Edited in the worktree only
    ModifiedUnstaged,
    /// Edited and staged
    ModifiedStaged,
    /// Edited, staged, then edited again
    ModifiedStagedUnstaged,
    /// Deleted from the worktree only
    DeletedUnstaged,
    /// Deletion staged
    DeletedStaged,
    /// Deletion staged, then the path recreated with different content
    DeletedModified,
    /// Deletion staged while an identical untracked file remains
    DeletedUntracked,
    /// Edit staged, then the file deleted from the worktree
    ModifiedDeleted,
}

impl GitFileStatus {
    /// Stable string label for persistence and UI use
    pub fn as_str(&self) -> &'static str {
        match self {
            GitFileStatus::Absent => "absent",
            GitFileStatus::Untracked => "untracked",
            GitFileStatus::Added => "added",
            GitFileStatus::AddedModified => "added-then-modified",
            GitFileStatus::AddedDeleted => "added-then-deleted",
            GitFileStatus::Unmodified => "unmodified",
            GitFileStatus::ModifiedUnstaged => "modified-unstaged",
            GitFileStatus::ModifiedStaged => "modified-staged",
            GitFileStatus::ModifiedStagedUnstaged => "modified-staged-and-unstaged",
            GitFileStatus::DeletedUnstaged => "deleted-unstaged",
            GitFileStatus::DeletedStaged => "deleted-staged",
            GitFileStatus::DeletedModified => "deleted-then-modified",
            GitFileStatus::DeletedUntracked => "deleted-with-untracked",
            GitFileStatus::ModifiedDeleted => "modified-then-deleted",
        }
    }

    /// True for every state that would show up in a "changes" list
    pub fn is_dirty(&self) -> bool {
        !matches!(self, GitFileStatus::Absent | GitFileStatus::Unmodified)
    }
}

impl fmt::Display for GitFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a status row onto its named state.
///
/// The table is exhaustive over the fourteen tuples the engine can produce
/// for a well-formed repository. An unknown key is a defect, not a file
/// state, and must never be silently reported as `Unmodified`.
pub fn classify(row: &StatusRow) -> Result<GitFileStatus> {
    let status = match (row.head, row.worktree, row.stage) {
        (0, 0, 0) => GitFileStatus::Absent,
        (0, 2, 0) => GitFileStatus::Untracked,
        (0, 2, 2) => GitFileStatus::Added,
        (0, 2, 3) => GitFileStatus::AddedModified,
        (0, 0, 3) => GitFileStatus::AddedDeleted,
        (1, 1, 1) => GitFileStatus::Unmodified,
        (1, 2, 1) => GitFileStatus::ModifiedUnstaged,
        (1, 2, 2) => GitFileStatus::ModifiedStaged,
        (1, 2, 3) => GitFileStatus::ModifiedStagedUnstaged,
        (1, 0, 1) => GitFileStatus::DeletedUnstaged,
        (1, 0, 0) => GitFileStatus::DeletedStaged,
        (1, 2, 0) => GitFileStatus::DeletedModified,
        (1, 1, 0) => GitFileStatus::DeletedUntracked,
        (1, 0, 3) => GitFileStatus::ModifiedDeleted,
        _ => return Err(SyncError::unknown_status_tuple(&row.path, row.key())),
    };
    Ok(status)
}

/// The file is gone from the working copy.
pub fn is_deleted_in_worktree(row: &StatusRow) -> bool {
    row.worktree == 0
}

/// The staged content and the worktree content disagree.
pub fn has_unstaged_divergence(row: &StatusRow) -> bool {
    row.worktree != row.stage
}

/// The working copy differs from the last commit.
pub fn differs_from_head(row: &StatusRow) -> bool {
    !(row.head == 1 && row.worktree == 1)
}

/// The staged entry is identical to the last commit.
pub fn index_matches_head(row: &StatusRow) -> bool {
    row.stage == 1
}
