//! Copy configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file
//! (or none at all) is valid.
//!
//! ```json
//! {
//!     "submitter_id": "system",
//!     "cycle_policy": "drop_back_reference",
//!     "lazy_fetch": true
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CopyError, Result};

/// Identity stamped on submissions when none is configured.
pub const DEFAULT_SUBMITTER: &str = "system";

/// What to do with an index entry that points back into a case still
/// being copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Drop the entry and record it in the diagnostics only.
    #[default]
    DropBackReference,
    /// Drop the entry and also report an error for the referencing case.
    ReportError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Principal recorded as the author of every submission.
    pub submitter_id: String,
    pub cycle_policy: CyclePolicy,
    /// Fetch parents that were not part of the requested batch.
    pub lazy_fetch: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            submitter_id: DEFAULT_SUBMITTER.to_string(),
            cycle_policy: CyclePolicy::default(),
            lazy_fetch: true,
        }
    }
}

impl CopyConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            CopyError::InvalidFileFormat(format!(
                "failed to parse config {}: {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.submitter_id.trim().is_empty() {
            return Err(CopyError::InvalidConfig(
                "submitter_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_submitter(mut self, submitter_id: impl Into<String>) -> Self {
        self.submitter_id = submitter_id.into();
        self
    }

    pub fn with_cycle_policy(mut self, cycle_policy: CyclePolicy) -> Self {
        self.cycle_policy = cycle_policy;
        self
    }
}
