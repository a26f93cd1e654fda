//! Batch submission: handing every shell of a copy call to the sink as
//! one unit and collecting per-shell outcomes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::case::{CaseId, CaseShell};
use crate::storage::{ShellOutcome, SubmissionSink};

/// The unit handed to a [`SubmissionSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: String,
    pub domain: String,
    /// Principal the new cases are submitted as.
    pub submitted_by: String,
    /// Microseconds since Unix epoch.
    pub submitted_at: u64,
    /// Shells in build order, parents before children.
    pub shells: Vec<CaseShell>,
}

/// Result of one commit.
#[derive(Debug, Clone, Default)]
pub struct CommitReport {
    /// `None` when there was nothing to submit.
    pub submission_id: Option<String>,
    /// One outcome per shell, in submission order.
    pub outcomes: Vec<ShellOutcome>,
}

impl CommitReport {
    pub fn saved(&self) -> impl Iterator<Item = &ShellOutcome> {
        self.outcomes.iter().filter(|o| o.is_saved())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ShellOutcome> {
        self.outcomes.iter().filter(|o| !o.is_saved())
    }
}

/// Submits shells on behalf of a configured principal. Does not retry.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    submitter_id: String,
}

impl BatchCoordinator {
    pub fn new(submitter_id: impl Into<String>) -> Self {
        Self {
            submitter_id: submitter_id.into(),
        }
    }

    pub fn submitter_id(&self) -> &str {
        &self.submitter_id
    }

    /// Build the submission for `shells` without sending it.
    pub fn prepare(&self, domain: &str, shells: Vec<CaseShell>) -> Submission {
        let now = crate::time::now_micros();
        Submission {
            submission_id: submission_id(domain, &self.submitter_id, now, &shells),
            domain: domain.to_string(),
            submitted_by: self.submitter_id.clone(),
            submitted_at: now,
            shells,
        }
    }

    /// Submit `shells` to `sink` as a single submission.
    ///
    /// An empty batch never reaches the sink. A sink error fails every
    /// shell; a shell the sink says nothing about counts as failed.
    pub fn commit(
        &self,
        domain: &str,
        shells: Vec<CaseShell>,
        sink: &dyn SubmissionSink,
    ) -> CommitReport {
        if shells.is_empty() {
            return CommitReport::default();
        }

        let submission = self.prepare(domain, shells);
        log::debug!(
            "submitting {} shell(s) to {} as {} ({})",
            submission.shells.len(),
            domain,
            submission.submitted_by,
            submission.submission_id
        );

        let outcomes = match sink.commit(&submission) {
            Ok(reported) => match_outcomes(&submission.shells, reported),
            Err(e) => {
                log::warn!("submission {} failed: {e}", submission.submission_id);
                submission
                    .shells
                    .iter()
                    .map(|s| ShellOutcome::failed(s, e.to_string()))
                    .collect()
            }
        };

        for failed in outcomes.iter().filter(|o| !o.is_saved()) {
            log::warn!(
                "copy of case {} was not saved: {}",
                failed.original_case_id,
                failed.error.as_deref().unwrap_or_default()
            );
        }

        CommitReport {
            submission_id: Some(submission.submission_id),
            outcomes,
        }
    }
}

/// Line sink-reported outcomes up with the submitted shells.
fn match_outcomes(shells: &[CaseShell], reported: Vec<ShellOutcome>) -> Vec<ShellOutcome> {
    let mut by_new_id: HashMap<CaseId, ShellOutcome> = reported
        .into_iter()
        .map(|o| (o.new_case_id.clone(), o))
        .collect();

    shells
        .iter()
        .map(|shell| {
            by_new_id
                .remove(&shell.new_case_id)
                .unwrap_or_else(|| ShellOutcome::failed(shell, "no outcome reported by sink"))
        })
        .collect()
}

/// `csub_` + base58 of a truncated SHA-256 over the submission's identity.
fn submission_id(domain: &str, submitter: &str, now: u64, shells: &[CaseShell]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("submission:{domain}:{submitter}:{now}:{}", shells.len()).as_bytes());
    for shell in shells {
        hasher.update(shell.new_case_id.as_str().as_bytes());
    }
    let hash = hasher.finalize();
    format!("csub_{}", bs58::encode(&hash[..16]).into_string())
}
