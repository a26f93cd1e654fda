//! Per-call memoization table.
//!
//! Shells live in one arena in the order they were finished (parents
//! before the children that reference them); the table maps each original
//! id to its state and, once built, to its arena slot.

use std::collections::HashMap;

use crate::case::{CaseId, CaseShell};

/// State of one original case within a copy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Entered but its shell is not built yet.
    InProgress,
    /// Shell built; index into the arena.
    Copied(usize),
    /// Refused (already owned by the target owner).
    NotCopied,
}

#[derive(Debug, Default)]
pub struct MemoTable {
    slots: HashMap<CaseId, Slot>,
    shells: Vec<CaseShell>,
}

impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, original: &CaseId) -> Option<Slot> {
        self.slots.get(original).copied()
    }

    /// Mark `original` as being copied.
    pub fn begin(&mut self, original: &CaseId) {
        self.slots.insert(original.clone(), Slot::InProgress);
    }

    /// Record a finished shell under its original id.
    pub fn finish(&mut self, shell: CaseShell) -> &CaseShell {
        let idx = self.shells.len();
        self.slots
            .insert(shell.original_case_id.clone(), Slot::Copied(idx));
        self.shells.push(shell);
        &self.shells[idx]
    }

    /// Record that `original` will not be copied.
    pub fn refuse(&mut self, original: &CaseId) {
        self.slots.insert(original.clone(), Slot::NotCopied);
    }

    pub fn shell(&self, original: &CaseId) -> Option<&CaseShell> {
        match self.slot(original)? {
            Slot::Copied(idx) => self.shells.get(idx),
            _ => None,
        }
    }

    pub fn new_id(&self, original: &CaseId) -> Option<&CaseId> {
        self.shell(original).map(|s| &s.new_case_id)
    }

    /// Number of shells built.
    pub fn len(&self) -> usize {
        self.shells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    /// The arena, in build order.
    pub fn into_shells(self) -> Vec<CaseShell> {
        self.shells
    }
}
