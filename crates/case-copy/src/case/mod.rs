//! Case records: the snapshots read from the store and the shells
//! built from them.

pub mod id;
pub mod types;

pub use id::new_case_id;
pub use types::{Case, CaseId, CaseShell, IndexRef, Relationship};
