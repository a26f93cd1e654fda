//! Copy requests.

use serde::{Deserialize, Serialize};

use crate::case::CaseId;
use crate::censor::CensorMap;
use crate::error::{CopyError, Result};

/// What to copy, and to whom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequest {
    pub domain: String,
    /// New owner of every copy. Required.
    pub target_owner: Option<String>,
    /// Cases to copy; the order here is the order results come back in.
    pub source_case_ids: Vec<CaseId>,
    #[serde(default)]
    pub censor_map: CensorMap,
}

impl CopyRequest {
    pub fn new(domain: impl Into<String>, target_owner: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            target_owner: Some(target_owner.into()),
            ..Self::default()
        }
    }

    pub fn with_cases<I, T>(mut self, case_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CaseId>,
    {
        self.source_case_ids
            .extend(case_ids.into_iter().map(Into::into));
        self
    }

    pub fn with_censor(mut self, field: impl Into<String>, transform: impl Into<String>) -> Self {
        self.censor_map.insert(field.into(), transform.into());
        self
    }

    /// The target owner, or `MissingTargetOwner` when unset or blank.
    pub fn target_owner(&self) -> Result<&str> {
        match self.target_owner.as_deref() {
            Some(owner) if !owner.trim().is_empty() => Ok(owner),
            _ => Err(CopyError::MissingTargetOwner),
        }
    }
}
