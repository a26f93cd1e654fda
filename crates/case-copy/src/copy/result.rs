//! Copy results and diagnostics.

use serde::{Deserialize, Serialize};

use crate::case::CaseId;
use crate::error::CopyError;

/// Why an index entry was left out of a shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The parent does not exist (or lazy fetching is off).
    Missing,
    /// The parent is already owned by the target owner and was not copied.
    ParentNotCopied,
    /// The parent was still being copied: the entry closes a cycle.
    Cycle,
}

/// An index entry dropped from a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedIndex {
    /// Original id of the case whose shell lost the entry.
    pub case_id: CaseId,
    pub identifier: String,
    pub referenced_case_id: CaseId,
    pub reason: DropReason,
}

/// Things a copy noticed that are not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyDiagnostics {
    /// Requested ids the store did not have.
    pub missing: Vec<CaseId>,
    pub dropped_indices: Vec<DroppedIndex>,
}

impl CopyDiagnostics {
    /// Dropped entries whose parent could not be copied.
    pub fn unresolved(&self) -> impl Iterator<Item = &DroppedIndex> {
        self.dropped_indices
            .iter()
            .filter(|d| d.reason != DropReason::Cycle)
    }

    /// Dropped entries that closed a reference cycle.
    pub fn cycles(&self) -> impl Iterator<Item = &DroppedIndex> {
        self.dropped_indices
            .iter()
            .filter(|d| d.reason == DropReason::Cycle)
    }
}

/// Outcome of one copy call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    /// (original, new) for every case that was copied and persisted.
    pub id_pairs: Vec<(CaseId, CaseId)>,
    /// One message per case that was refused or failed to persist.
    pub errors: Vec<String>,
    pub diagnostics: CopyDiagnostics,
    /// Id of the submission handed to the sink, if anything was submitted.
    pub submission_id: Option<String>,
}

impl CopyResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A result carrying a single request-level error and no pairs.
    pub fn from_error(error: &CopyError) -> Self {
        Self {
            errors: vec![error.to_string()],
            ..Self::default()
        }
    }

    pub fn success_count(&self) -> usize {
        self.id_pairs.len()
    }

    /// Nothing copied and something reported.
    pub fn is_failure(&self) -> bool {
        self.id_pairs.is_empty() && !self.errors.is_empty()
    }

    /// New id assigned to `original`, if it was copied.
    pub fn new_id_for(&self, original: &CaseId) -> Option<&CaseId> {
        self.id_pairs
            .iter()
            .find(|(orig, _)| orig == original)
            .map(|(_, new)| new)
    }
}
