//! In-memory case store.
//!
//! Implements both [`RecordStore`] and [`SubmissionSink`], so a copy can
//! read its originals from and write its shells to the same instance.
//! Counts fetches and can be told to reject specific originals on commit,
//! which is what most tests need.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::case::{Case, CaseId};
use crate::copy::Submission;
use crate::error::{CopyError, Result};

use super::{FailedShells, RecordStore, ShellOutcome, SubmissionSink};

type CaseKey = (String, CaseId);

/// Thread-safe in-process case store.
#[derive(Debug, Default)]
pub struct MemoryCaseStore {
    cases: RwLock<BTreeMap<CaseKey, Case>>,
    rejected: RwLock<BTreeSet<CaseId>>,
    submissions: RwLock<Vec<Submission>>,
    batch_fetches: AtomicUsize,
    lazy_fetches: AtomicUsize,
}

fn poisoned() -> CopyError {
    CopyError::Store("case store lock poisoned".to_string())
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| poisoned())
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| poisoned())
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `cases`.
    pub fn with_cases(cases: impl IntoIterator<Item = Case>) -> Result<Self> {
        let store = Self::new();
        for case in cases {
            store.insert(case)?;
        }
        Ok(store)
    }

    /// Add or replace a case.
    pub fn insert(&self, case: Case) -> Result<()> {
        write(&self.cases)?.insert((case.domain.clone(), case.case_id.clone()), case);
        Ok(())
    }

    pub fn get(&self, domain: &str, case_id: &CaseId) -> Result<Option<Case>> {
        Ok(read(&self.cases)?
            .get(&(domain.to_string(), case_id.clone()))
            .cloned())
    }

    /// Every case in `domain` owned by `owner_id`.
    pub fn owned_by(&self, domain: &str, owner_id: &str) -> Result<Vec<Case>> {
        Ok(read(&self.cases)?
            .values()
            .filter(|c| c.domain == domain && c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(read(&self.cases)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Make every future commit refuse the copy of `original`.
    pub fn reject_on_commit(&self, original: impl Into<CaseId>) -> Result<()> {
        write(&self.rejected)?.insert(original.into());
        Ok(())
    }

    /// Submissions received so far, oldest first.
    pub fn submissions(&self) -> Result<Vec<Submission>> {
        Ok(read(&self.submissions)?.clone())
    }

    /// Number of `fetch_many` calls served.
    pub fn batch_fetch_count(&self) -> usize {
        self.batch_fetches.load(Ordering::SeqCst)
    }

    /// Number of `fetch_one` calls served.
    pub fn lazy_fetch_count(&self) -> usize {
        self.lazy_fetches.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryCaseStore {
    fn fetch_many(&self, domain: &str, case_ids: &[CaseId]) -> Result<BTreeMap<CaseId, Case>> {
        self.batch_fetches.fetch_add(1, Ordering::SeqCst);
        let cases = read(&self.cases)?;
        Ok(case_ids
            .iter()
            .filter_map(|id| {
                cases
                    .get(&(domain.to_string(), id.clone()))
                    .map(|c| (id.clone(), c.clone()))
            })
            .collect())
    }

    fn fetch_one(&self, domain: &str, case_id: &CaseId) -> Result<Option<Case>> {
        self.lazy_fetches.fetch_add(1, Ordering::SeqCst);
        self.get(domain, case_id)
    }
}

impl SubmissionSink for MemoryCaseStore {
    fn commit(&self, submission: &Submission) -> Result<Vec<ShellOutcome>> {
        let rejected = read(&self.rejected)?;
        let mut cases = write(&self.cases)?;
        let mut outcomes = Vec::with_capacity(submission.shells.len());
        let mut failed = FailedShells::new();

        for shell in &submission.shells {
            let key = (shell.domain.clone(), shell.new_case_id.clone());
            let refusal = if rejected.contains(&shell.original_case_id) {
                Some("rejected by store")
            } else if cases.contains_key(&key) {
                Some("case id already exists")
            } else {
                None
            };

            match refusal {
                Some(reason) => {
                    failed.record(shell);
                    outcomes.push(ShellOutcome::failed(shell, reason));
                }
                None => {
                    let (case, stripped) = failed.strip(shell);
                    cases.insert(key, case);
                    outcomes.push(ShellOutcome::saved_without(shell, stripped));
                }
            }
        }

        write(&self.submissions)?.push(submission.clone());
        Ok(outcomes)
    }
}
