//! Case persistence on disk: store and retrieve `Case` records.
//!
//! Each case is stored as a single JSON file named `{case_id}.json` inside
//! a per-domain directory under the configured base directory. Committed
//! submissions additionally leave a manifest under `_submissions/`.
//!
//! File format:
//! ```json
//! {
//!     "version": 1,
//!     "case": { ... Case ... }
//! }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::case::{Case, CaseId};
use crate::copy::Submission;
use crate::error::{CopyError, Result};

use super::{FailedShells, RecordStore, ShellOutcome, SubmissionSink};

// ── File format constants ─────────────────────────────────────────────────────

const CASE_FILE_VERSION: u32 = 1;
const SUBMISSIONS_DIR: &str = "_submissions";

// ── On-disk structures ────────────────────────────────────────────────────────

/// Wrapper written to disk for each case.
#[derive(Debug, Serialize, Deserialize)]
struct CaseFile {
    /// Format version number.
    version: u32,
    /// The stored case.
    case: Case,
}

/// Record of one committed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionManifest {
    pub version: u32,
    pub submission_id: String,
    pub submitted_by: String,
    /// Microseconds since the Unix epoch.
    pub submitted_at: u64,
    /// (original, new) for every shell actually written.
    pub saved: Vec<(CaseId, CaseId)>,
}

// ── FileCaseStore ─────────────────────────────────────────────────────────────

/// Filesystem-backed case store.
///
/// The store is safe for single-process use; concurrent writes from
/// multiple processes are not coordinated beyond refusing to overwrite
/// an existing case file on commit.
pub struct FileCaseStore {
    base_dir: PathBuf,
}

impl FileCaseStore {
    /// Create a new `FileCaseStore` rooted at `base_dir`.
    ///
    /// The directory and any missing parents are created if they do not exist.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Persist a case, overwriting any existing file with the same ID.
    pub fn save(&self, case: &Case) -> Result<()> {
        let path = self.case_path(&case.domain, &case.case_id)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, encode_case(case)?)?;
        Ok(())
    }

    /// Load a case by domain and ID.
    pub fn load(&self, domain: &str, case_id: &CaseId) -> Result<Case> {
        let path = self.case_path(domain, case_id)?;

        if !path.exists() {
            return Err(CopyError::NotFound(format!("{domain}/{case_id}")));
        }

        let bytes = std::fs::read(&path)?;
        let file: CaseFile = serde_json::from_slice(&bytes).map_err(|e| {
            CopyError::InvalidFileFormat(format!(
                "failed to parse case file {}: {e}",
                path.display()
            ))
        })?;

        Ok(file.case)
    }

    /// List the IDs of all cases stored for `domain`, sorted.
    pub fn list(&self, domain: &str) -> Result<Vec<CaseId>> {
        let dir = self.domain_dir(domain)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(".json") {
                ids.push(CaseId(stem.to_string()));
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Load all cases for `domain`, skipping unreadable files.
    pub fn load_all(&self, domain: &str) -> Result<Vec<Case>> {
        let ids = self.list(domain)?;
        let mut cases = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.load(domain, id) {
                Ok(case) => cases.push(case),
                Err(e) => log::warn!("skipping unreadable case {domain}/{id}: {e}"),
            }
        }

        Ok(cases)
    }

    /// Manifests of every submission committed for `domain`, oldest first.
    pub fn submissions(&self, domain: &str) -> Result<Vec<SubmissionManifest>> {
        let dir = self.domain_dir(domain)?.join(SUBMISSIONS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|x| x != "json").unwrap_or(true) {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            match serde_json::from_slice::<SubmissionManifest>(&bytes) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => log::warn!("skipping unreadable manifest {}: {e}", path.display()),
            }
        }

        manifests.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.submission_id.cmp(&b.submission_id))
        });
        Ok(manifests)
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn domain_dir(&self, domain: &str) -> Result<PathBuf> {
        check_component(domain)?;
        Ok(self.base_dir.join(domain))
    }

    fn case_path(&self, domain: &str, case_id: &CaseId) -> Result<PathBuf> {
        check_component(case_id.as_str())?;
        Ok(self.domain_dir(domain)?.join(format!("{case_id}.json")))
    }

    /// Write a case file, refusing to replace an existing one.
    fn create_case(&self, case: &Case) -> Result<()> {
        let path = self.case_path(&case.domain, &case.case_id)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(&encode_case(case)?)?;
        Ok(())
    }

    fn write_manifest(&self, submission: &Submission, saved: Vec<(CaseId, CaseId)>) -> Result<()> {
        check_component(&submission.submission_id)?;
        let dir = self.domain_dir(&submission.domain)?.join(SUBMISSIONS_DIR);
        std::fs::create_dir_all(&dir)?;

        let manifest = SubmissionManifest {
            version: CASE_FILE_VERSION,
            submission_id: submission.submission_id.clone(),
            submitted_by: submission.submitted_by.clone(),
            submitted_at: submission.submitted_at,
            saved,
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| CopyError::Serialization(e.to_string()))?;
        std::fs::write(
            dir.join(format!("{}.json", submission.submission_id)),
            json.as_bytes(),
        )?;
        Ok(())
    }
}

fn encode_case(case: &Case) -> Result<Vec<u8>> {
    let file = CaseFile {
        version: CASE_FILE_VERSION,
        case: case.clone(),
    };
    serde_json::to_vec_pretty(&file).map_err(|e| CopyError::Serialization(e.to_string()))
}

/// Domains and ids become path components; keep them inside the base dir.
fn check_component(s: &str) -> Result<()> {
    if s.is_empty() || s.starts_with('.') || s.contains(['/', '\\']) {
        return Err(CopyError::Store(format!("unsafe path component: {s:?}")));
    }
    Ok(())
}

impl RecordStore for FileCaseStore {
    fn fetch_many(&self, domain: &str, case_ids: &[CaseId]) -> Result<BTreeMap<CaseId, Case>> {
        let mut found = BTreeMap::new();
        for id in case_ids {
            if let Some(case) = self.fetch_one(domain, id)? {
                found.insert(id.clone(), case);
            }
        }
        Ok(found)
    }

    fn fetch_one(&self, domain: &str, case_id: &CaseId) -> Result<Option<Case>> {
        match self.load(domain, case_id) {
            Ok(case) => Ok(Some(case)),
            Err(CopyError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl SubmissionSink for FileCaseStore {
    fn commit(&self, submission: &Submission) -> Result<Vec<ShellOutcome>> {
        let mut outcomes = Vec::with_capacity(submission.shells.len());
        let mut saved = Vec::new();
        let mut failed = FailedShells::new();

        for shell in &submission.shells {
            let (case, stripped) = failed.strip(shell);
            match self.create_case(&case) {
                Ok(()) => {
                    saved.push((shell.original_case_id.clone(), shell.new_case_id.clone()));
                    outcomes.push(ShellOutcome::saved_without(shell, stripped));
                }
                Err(e) => {
                    failed.record(shell);
                    outcomes.push(ShellOutcome::failed(shell, e.to_string()));
                }
            }
        }

        // The cases are on disk by now; a missing manifest must not mark them failed.
        if let Err(e) = self.write_manifest(submission, saved) {
            log::warn!(
                "failed to write manifest for submission {}: {e}",
                submission.submission_id
            );
        }
        Ok(outcomes)
    }
}
