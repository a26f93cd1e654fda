//! Index resolution: rewriting a case's parent references to point at
//! the copies of those parents.
//!
//! Resolution never recurses by itself. It reports which parents have to
//! be copied first; the duplicator copies them and resolves again.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::case::{Case, CaseId, IndexRef};

use super::memo::{MemoTable, Slot};
use super::result::DropReason;

// ---------------------------------------------------------------------------
// Originals cache
// ---------------------------------------------------------------------------

/// Cases read from the store during one copy call, plus the ids known not
/// to exist so they are never fetched twice.
#[derive(Debug, Default)]
pub struct Originals {
    cases: HashMap<CaseId, Case>,
    missing: HashSet<CaseId>,
}

impl Originals {
    pub fn new(cases: impl IntoIterator<Item = (CaseId, Case)>) -> Self {
        Self {
            cases: cases.into_iter().collect(),
            missing: HashSet::new(),
        }
    }

    pub fn get(&self, id: &CaseId) -> Option<&Case> {
        self.cases.get(id)
    }

    pub fn contains(&self, id: &CaseId) -> bool {
        self.cases.contains_key(id)
    }

    pub fn is_missing(&self, id: &CaseId) -> bool {
        self.missing.contains(id)
    }

    /// Cache `case` under the id it was requested by.
    pub fn insert(&mut self, id: CaseId, case: Case) {
        self.cases.insert(id, case);
    }

    pub fn mark_missing(&mut self, id: &CaseId) {
        self.missing.insert(id.clone());
    }

    pub fn ids(&self) -> impl Iterator<Item = &CaseId> {
        self.cases.keys()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What to do with one reference to `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The parent has been copied; point at its new id.
    Copied(CaseId),
    /// The parent must be copied (or fetched, then copied) first.
    Required,
    /// The reference cannot be kept.
    Dropped(DropReason),
}

pub fn classify(
    parent: &CaseId,
    memo: &MemoTable,
    originals: &Originals,
    lazy_fetch: bool,
) -> Resolution {
    match memo.slot(parent) {
        Some(Slot::Copied(_)) => match memo.new_id(parent) {
            Some(new_id) => Resolution::Copied(new_id.clone()),
            None => Resolution::Dropped(DropReason::Missing),
        },
        Some(Slot::InProgress) => Resolution::Dropped(DropReason::Cycle),
        Some(Slot::NotCopied) => Resolution::Dropped(DropReason::ParentNotCopied),
        None if originals.contains(parent) => Resolution::Required,
        None if originals.is_missing(parent) || !lazy_fetch => {
            Resolution::Dropped(DropReason::Missing)
        }
        None => Resolution::Required,
    }
}

/// One resolution pass over a case's index map.
#[derive(Debug, Default)]
pub struct ResolvedIndices {
    /// Entries rewritten to new ids.
    pub indices: BTreeMap<String, IndexRef>,
    /// Parents to copy before the pass can be final, in first-seen order.
    pub required: Vec<CaseId>,
    /// (identifier, original parent id, reason) for entries left out.
    pub dropped: Vec<(String, CaseId, DropReason)>,
}

impl ResolvedIndices {
    /// No parent is outstanding; `indices` and `dropped` are final.
    pub fn is_complete(&self) -> bool {
        self.required.is_empty()
    }
}

pub fn resolve(
    indices: &BTreeMap<String, IndexRef>,
    memo: &MemoTable,
    originals: &Originals,
    lazy_fetch: bool,
) -> ResolvedIndices {
    let mut out = ResolvedIndices::default();
    for (identifier, index) in indices {
        let parent = &index.referenced_case_id;
        match classify(parent, memo, originals, lazy_fetch) {
            Resolution::Copied(new_id) => {
                out.indices.insert(identifier.clone(), index.retarget(new_id));
            }
            Resolution::Required => {
                if !out.required.contains(parent) {
                    out.required.push(parent.clone());
                }
            }
            Resolution::Dropped(reason) => {
                out.dropped.push((identifier.clone(), parent.clone(), reason));
            }
        }
    }
    out
}
