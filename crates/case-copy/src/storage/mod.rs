//! Storage layer: where originals are read from and copies are written to.
//!
//! The copy algorithm only sees the two traits defined here:
//!
//! - [`RecordStore`]: resolves case identifiers to case snapshots.
//! - [`SubmissionSink`]: durably persists a batch of new cases.
//!
//! # Implementations
//!
//! - [`memory`]: thread-safe in-process store implementing both traits.
//! - [`case_store`]: JSON files on disk, one per case:
//!
//! ```text
//! {base}/
//! └── {domain}/
//!     ├── {case_id}.json
//!     └── _submissions/
//!         └── {submission_id}.json
//! ```

pub mod case_store;
pub mod memory;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::case::{Case, CaseId, CaseShell};
use crate::copy::Submission;
use crate::error::Result;

pub use case_store::{FileCaseStore, SubmissionManifest};
pub use memory::MemoryCaseStore;

/// Read access to existing cases.
pub trait RecordStore {
    /// Fetch every case in `case_ids` that exists in `domain`. Unknown ids
    /// are simply absent from the returned map.
    fn fetch_many(&self, domain: &str, case_ids: &[CaseId]) -> Result<BTreeMap<CaseId, Case>>;

    /// Fetch a single case, `None` if it does not exist.
    fn fetch_one(&self, domain: &str, case_id: &CaseId) -> Result<Option<Case>>;
}

/// Durable persistence for newly built cases.
pub trait SubmissionSink {
    /// Persist every shell in `submission`, reporting one outcome per shell.
    ///
    /// An `Err` means nothing in the submission can be assumed persisted.
    fn commit(&self, submission: &Submission) -> Result<Vec<ShellOutcome>>;
}

/// Whether one shell was durably persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellOutcome {
    pub original_case_id: CaseId,
    pub new_case_id: CaseId,
    /// `None` on success, otherwise the reason the shell was not saved.
    pub error: Option<String>,
    /// Index entries removed before saving because they pointed at a
    /// shell of the same submission that failed: (identifier, original
    /// parent id).
    #[serde(default)]
    pub stripped_indices: Vec<(String, CaseId)>,
}

impl ShellOutcome {
    pub fn saved(shell: &CaseShell) -> Self {
        Self {
            original_case_id: shell.original_case_id.clone(),
            new_case_id: shell.new_case_id.clone(),
            error: None,
            stripped_indices: Vec::new(),
        }
    }

    /// A saved shell that lost the index entries in `stripped`.
    pub fn saved_without(shell: &CaseShell, stripped: Vec<(String, CaseId)>) -> Self {
        Self {
            stripped_indices: stripped,
            ..Self::saved(shell)
        }
    }

    pub fn failed(shell: &CaseShell, reason: impl Into<String>) -> Self {
        Self {
            original_case_id: shell.original_case_id.clone(),
            new_case_id: shell.new_case_id.clone(),
            error: Some(reason.into()),
            stripped_indices: Vec::new(),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.error.is_none()
    }
}

/// Shells of one submission that failed to save.
///
/// Shells arrive parents first, so a sink records each failure here and
/// strips references to it from the shells that follow.
#[derive(Debug, Default)]
pub struct FailedShells {
    /// New id to original id.
    by_new_id: HashMap<CaseId, CaseId>,
}

impl FailedShells {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, shell: &CaseShell) {
        self.by_new_id
            .insert(shell.new_case_id.clone(), shell.original_case_id.clone());
    }

    /// The case to write for `shell`, without index entries that point at
    /// a failed shell, and the (identifier, original parent id) of every
    /// entry removed.
    pub fn strip(&self, shell: &CaseShell) -> (Case, Vec<(String, CaseId)>) {
        let mut case = shell.to_case();
        let mut stripped = Vec::new();
        case.indices.retain(|identifier, index| {
            match self.by_new_id.get(&index.referenced_case_id) {
                Some(original) => {
                    stripped.push((identifier.clone(), original.clone()));
                    false
                }
                None => true,
            }
        });
        (case, stripped)
    }
}
