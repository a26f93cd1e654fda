//! Case copying: duplicating a case graph to a new owner.
//!
//! The copy module provides:
//! - Request and result models
//! - Index resolution against the per-call memoization table
//! - Depth-first, memoized duplication with on-demand parent fetching
//! - Cycle breaking with a configurable policy
//! - Single-submission commit with per-case failure reporting

pub mod coordinator;
pub mod duplicator;
pub mod memo;
pub mod request;
pub mod resolver;
pub mod result;

pub use coordinator::{BatchCoordinator, CommitReport, Submission};
pub use duplicator::CaseCopier;
pub use memo::{MemoTable, Slot};
pub use request::CopyRequest;
pub use resolver::{classify, resolve, Originals, Resolution, ResolvedIndices};
pub use result::{CopyDiagnostics, CopyResult, DropReason, DroppedIndex};
