//! CaseCopy: duplicate case records to a new owner.
//!
//! Copies a set of hierarchical case records while preserving the
//! parent/child graph between them, applying field-level
//! de-identification, and submitting every new record as one batch.
//! Parents outside the requested set are pulled in on demand, each
//! original case is copied at most once per call, and per-case problems
//! are reported alongside whatever succeeded.

pub mod case;
pub mod censor;
pub mod config;
pub mod copy;
pub mod error;
pub mod storage;
pub mod time;

// Re-export primary types
pub use case::{Case, CaseId, CaseShell, IndexRef, Relationship};
pub use censor::{CensorMap, CensorPlan, DeidTransforms, Overrides, TransformRegistry};
pub use config::{CopyConfig, CyclePolicy};
pub use copy::{
    BatchCoordinator, CaseCopier, CopyDiagnostics, CopyRequest, CopyResult, DropReason,
    DroppedIndex, Submission,
};
pub use error::{CopyError, Result};
pub use storage::{
    FailedShells, FileCaseStore, MemoryCaseStore, RecordStore, ShellOutcome, SubmissionManifest,
    SubmissionSink,
};
