//! Case duplication: depth-first, memoized copying of a case graph.
//!
//! Every requested case is copied after the parents it references, each
//! original at most once per call. Parents outside the request are
//! fetched on demand. Shells are built in memory and committed in one
//! submission at the end.

use std::collections::HashSet;

use crate::case::{new_case_id, Case, CaseId, CaseShell};
use crate::censor::{CensorMap, CensorPlan, TransformRegistry};
use crate::config::{CopyConfig, CyclePolicy};
use crate::error::Result;
use crate::storage::{RecordStore, SubmissionSink};

use super::coordinator::BatchCoordinator;
use super::memo::MemoTable;
use super::request::CopyRequest;
use super::resolver::{resolve, Originals, ResolvedIndices};
use super::result::{CopyDiagnostics, CopyResult, DropReason, DroppedIndex};

// ---------------------------------------------------------------------------
// CaseCopier
// ---------------------------------------------------------------------------

/// Copies cases from a record store into a submission sink.
///
/// Holds no mutable state; concurrent calls only share what the store and
/// sink share.
pub struct CaseCopier<'a> {
    store: &'a dyn RecordStore,
    sink: &'a dyn SubmissionSink,
    transforms: &'a dyn TransformRegistry,
    config: CopyConfig,
}

impl<'a> CaseCopier<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        sink: &'a dyn SubmissionSink,
        transforms: &'a dyn TransformRegistry,
    ) -> Self {
        Self {
            store,
            sink,
            transforms,
            config: CopyConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CopyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Copy `source_case_ids` in `domain` to `target_owner`.
    pub fn copy_cases(
        &self,
        domain: &str,
        target_owner: &str,
        source_case_ids: &[CaseId],
        censor_map: &CensorMap,
    ) -> Result<CopyResult> {
        let request = CopyRequest {
            domain: domain.to_string(),
            target_owner: Some(target_owner.to_string()),
            source_case_ids: source_case_ids.to_vec(),
            censor_map: censor_map.clone(),
        };
        self.duplicate(&request)
    }

    /// Run a copy request.
    ///
    /// Configuration problems (missing owner, unknown transform, reserved
    /// censor field, invalid config) are returned as `Err` before any
    /// store access. Store read failures are also returned as `Err`;
    /// nothing has been written at that point. Everything else is
    /// reported through the returned [`CopyResult`].
    pub fn duplicate(&self, request: &CopyRequest) -> Result<CopyResult> {
        let target_owner = request.target_owner()?;
        self.config.validate()?;
        let plan = CensorPlan::compile(&request.censor_map, self.transforms)?;

        if request.source_case_ids.is_empty() {
            return Ok(CopyResult::empty());
        }

        let fetched = self
            .store
            .fetch_many(&request.domain, &request.source_case_ids)?;
        if fetched.is_empty() {
            log::debug!("no requested case exists in {}", request.domain);
            return Ok(CopyResult {
                diagnostics: CopyDiagnostics {
                    missing: dedup(&request.source_case_ids),
                    ..CopyDiagnostics::default()
                },
                ..CopyResult::empty()
            });
        }

        let mut run = CopyRun::new(
            self,
            &request.domain,
            target_owner,
            &plan,
            fetched,
            &request.source_case_ids,
        );
        for case_id in &request.source_case_ids {
            if run.originals.contains(case_id) {
                run.copy_one(case_id)?;
            } else {
                run.note_missing(case_id);
            }
        }

        let CopyRun {
            memo,
            mut errors,
            mut diagnostics,
            ..
        } = run;

        let report = BatchCoordinator::new(&self.config.submitter_id).commit(
            &request.domain,
            memo.into_shells(),
            self.sink,
        );

        let mut id_pairs = Vec::with_capacity(report.outcomes.len());
        for outcome in &report.outcomes {
            for (identifier, parent) in &outcome.stripped_indices {
                log::warn!(
                    "index '{identifier}' of case {} references {parent}, whose copy was not saved; dropped",
                    outcome.original_case_id
                );
                diagnostics.dropped_indices.push(DroppedIndex {
                    case_id: outcome.original_case_id.clone(),
                    identifier: identifier.clone(),
                    referenced_case_id: parent.clone(),
                    reason: DropReason::ParentNotCopied,
                });
            }
            match &outcome.error {
                None => id_pairs.push((
                    outcome.original_case_id.clone(),
                    outcome.new_case_id.clone(),
                )),
                Some(reason) => errors.push(format!(
                    "Failed to save copy of case '{}': {reason}",
                    outcome.original_case_id
                )),
            }
        }

        log::info!(
            "copied {} case(s) in {} to {} ({} error(s))",
            id_pairs.len(),
            request.domain,
            target_owner,
            errors.len()
        );

        Ok(CopyResult {
            id_pairs,
            errors,
            diagnostics,
            submission_id: report.submission_id,
        })
    }
}

fn dedup(ids: &[CaseId]) -> Vec<CaseId> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// One copy call
// ---------------------------------------------------------------------------

/// A case entered but not yet built.
struct Frame {
    case_id: CaseId,
    case: Case,
}

/// Mutable state of a single `duplicate` call.
struct CopyRun<'r> {
    store: &'r dyn RecordStore,
    config: &'r CopyConfig,
    domain: &'r str,
    target_owner: &'r str,
    plan: &'r CensorPlan,
    originals: Originals,
    memo: MemoTable,
    /// Every id seen in this call, original or generated.
    known_ids: HashSet<CaseId>,
    errors: Vec<String>,
    diagnostics: CopyDiagnostics,
}

impl<'r> CopyRun<'r> {
    fn new(
        copier: &'r CaseCopier<'_>,
        domain: &'r str,
        target_owner: &'r str,
        plan: &'r CensorPlan,
        fetched: impl IntoIterator<Item = (CaseId, Case)>,
        source_case_ids: &[CaseId],
    ) -> Self {
        let originals = Originals::new(fetched);
        let known_ids = originals
            .ids()
            .chain(source_case_ids)
            .cloned()
            .collect();
        Self {
            store: copier.store,
            config: &copier.config,
            domain,
            target_owner,
            plan,
            originals,
            memo: MemoTable::new(),
            known_ids,
            errors: Vec::new(),
            diagnostics: CopyDiagnostics::default(),
        }
    }

    fn note_missing(&mut self, case_id: &CaseId) {
        self.originals.mark_missing(case_id);
        if !self.diagnostics.missing.contains(case_id) {
            self.diagnostics.missing.push(case_id.clone());
        }
    }

    /// Copy `case_id` (and, first, every parent it needs). Returns the new
    /// id, or `None` when the case will not be copied.
    ///
    /// Depth-first over an explicit stack: the top frame is resolved, its
    /// first outstanding parent is entered and pushed, and a frame is only
    /// built once none of its parents is outstanding. Every frame on the
    /// stack is `InProgress`, so a reference back into the stack is a cycle.
    fn copy_one(&mut self, case_id: &CaseId) -> Result<Option<CaseId>> {
        let Some(root) = self.enter(case_id)? else {
            return Ok(self.memo.new_id(case_id).cloned());
        };

        let mut stack = vec![root];
        while let Some(frame) = stack.last() {
            let pass = resolve(
                &frame.case.indices,
                &self.memo,
                &self.originals,
                self.config.lazy_fetch,
            );

            if !pass.is_complete() {
                for parent in &pass.required {
                    if let Some(next) = self.enter(parent)? {
                        stack.push(next);
                        break;
                    }
                }
                // Parents that could not be entered are now settled; the
                // next pass drops them.
                continue;
            }

            if let Some(frame) = stack.pop() {
                self.build(frame, pass);
            }
        }

        Ok(self.memo.new_id(case_id).cloned())
    }

    /// Start copying `case_id`: `None` when it is already settled, missing,
    /// or owned by the target owner (which is reported and remembered).
    fn enter(&mut self, case_id: &CaseId) -> Result<Option<Frame>> {
        if self.memo.slot(case_id).is_some() {
            return Ok(None);
        }

        let Some(case) = self.original(case_id)? else {
            return Ok(None);
        };

        if case.owner_id == self.target_owner {
            self.memo.refuse(case_id);
            self.errors.push(format!(
                "Cannot copy case '{case_id}' to '{}': it is already owned by them",
                self.target_owner
            ));
            return Ok(None);
        }

        self.memo.begin(case_id);
        Ok(Some(Frame {
            case_id: case_id.clone(),
            case,
        }))
    }

    /// Build the shell for a frame whose parents are all settled.
    fn build(&mut self, frame: Frame, pass: ResolvedIndices) {
        let Frame { case_id, case } = frame;

        for (identifier, parent, reason) in pass.dropped {
            self.drop_index(&case_id, identifier, parent, reason);
        }

        let overrides = self.plan.apply(&case);
        let attrs = overrides.attributes;
        let mut properties = case.properties;
        properties.extend(overrides.properties);

        let shell = CaseShell {
            new_case_id: self.fresh_id(),
            original_case_id: case_id.clone(),
            domain: case.domain,
            case_type: case.case_type,
            name: attrs.name.unwrap_or(case.name),
            external_id: attrs.external_id.or(case.external_id),
            date_opened: attrs.date_opened.or(case.date_opened),
            owner_id: self.target_owner.to_string(),
            properties,
            indices: pass.indices,
        };

        let shell = self.memo.finish(shell);
        log::debug!("built copy {} of case {}", shell.new_case_id, case_id);
    }

    /// The original for `case_id`, fetching it if it was not part of the
    /// requested batch.
    fn original(&mut self, case_id: &CaseId) -> Result<Option<Case>> {
        if let Some(case) = self.originals.get(case_id) {
            return Ok(Some(case.clone()));
        }
        if self.originals.is_missing(case_id) || !self.config.lazy_fetch {
            return Ok(None);
        }

        match self.store.fetch_one(self.domain, case_id)? {
            Some(case) => {
                log::debug!("fetched parent case {case_id} outside the requested batch");
                self.known_ids.insert(case_id.clone());
                self.originals.insert(case_id.clone(), case.clone());
                Ok(Some(case))
            }
            None => {
                self.originals.mark_missing(case_id);
                Ok(None)
            }
        }
    }

    fn drop_index(
        &mut self,
        case_id: &CaseId,
        identifier: String,
        parent: CaseId,
        reason: DropReason,
    ) {
        match reason {
            DropReason::Cycle => {
                log::warn!(
                    "index '{identifier}' of case {case_id} closes a cycle through {parent}; dropped"
                );
                if self.config.cycle_policy == CyclePolicy::ReportError {
                    self.errors.push(format!(
                        "Case '{case_id}' index '{identifier}' forms a cycle through '{parent}'; reference dropped"
                    ));
                }
            }
            DropReason::Missing | DropReason::ParentNotCopied => {
                log::warn!(
                    "index '{identifier}' of case {case_id} references {parent}, which was not copied; dropped"
                );
            }
        }
        self.diagnostics.dropped_indices.push(DroppedIndex {
            case_id: case_id.clone(),
            identifier,
            referenced_case_id: parent,
            reason,
        });
    }

    /// A new id not equal to any id seen in this call.
    fn fresh_id(&mut self) -> CaseId {
        loop {
            let id = new_case_id();
            if self.known_ids.insert(id.clone()) {
                return id;
            }
        }
    }
}
