//! De-identification transform registry and the built-in transforms.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate};
use sha2::{Digest, Sha256};

use crate::case::Case;
use crate::error::{CopyError, Result};

/// Literal written by the `redact` transform.
pub const REDACTED: &str = "[redacted]";

/// Widest shift, in days either way, applied by `deid_date`.
pub const MAX_DATE_SHIFT_DAYS: i64 = 180;

/// A pure masking function. Receives the current field value and the case
/// it belongs to (transforms such as `deid_date` key off the case id).
pub type TransformFn = Arc<dyn Fn(&str, &Case) -> String + Send + Sync>;

/// Lookup of de-identification transforms by name.
pub trait TransformRegistry {
    /// Resolve a transform, failing with `UnknownTransform` for names the
    /// registry does not know.
    fn get_transform(&self, name: &str) -> Result<TransformFn>;

    /// Names of every registered transform, sorted.
    fn names(&self) -> Vec<String>;
}

/// Map-backed registry.
#[derive(Clone, Default)]
pub struct DeidTransforms {
    transforms: BTreeMap<String, TransformFn>,
}

impl DeidTransforms {
    /// A registry with no transforms.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding `redact`, `blank`, `deid_id` and `deid_date`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("redact", |_, _| REDACTED.to_string());
        registry.register("blank", |_, _| String::new());
        registry.register("deid_id", deid_id);
        registry.register("deid_date", deid_date);
        registry
    }

    /// Add or replace a transform.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&str, &Case) -> String + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(f));
    }
}

impl TransformRegistry for DeidTransforms {
    fn get_transform(&self, name: &str) -> Result<TransformFn> {
        self.transforms
            .get(name)
            .cloned()
            .ok_or_else(|| CopyError::UnknownTransform(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.transforms.keys().cloned().collect()
    }
}

impl std::fmt::Debug for DeidTransforms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeidTransforms")
            .field("transforms", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Built-ins
// ---------------------------------------------------------------------------

/// Deterministic pseudonym scoped to the case's domain.
pub fn deid_id(value: &str, case: &Case) -> String {
    let hash = Sha256::digest(format!("{}:{}", case.domain, value).as_bytes());
    hex::encode(&hash[..16])
}

/// Shift a date by an offset derived from the case id.
///
/// Every date on one case moves by the same number of days, so intervals
/// between them survive. Accepts `YYYY-MM-DD` or an RFC 3339 timestamp
/// (only the date part is kept); anything else comes back empty.
pub fn deid_date(value: &str, case: &Case) -> String {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value.trim())
                .ok()
                .map(|dt| dt.date_naive())
        });

    let Some(date) = date else {
        return String::new();
    };

    date.checked_add_signed(Duration::days(date_shift_days(case)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// The per-case offset used by `deid_date`: a nonzero day count within
/// `MAX_DATE_SHIFT_DAYS` of zero.
pub fn date_shift_days(case: &Case) -> i64 {
    let hash = Sha256::digest(case.case_id.as_str().as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash[..8]);
    // Never zero: a copied date must not equal its source.
    let offset = (u64::from_be_bytes(head) % (2 * MAX_DATE_SHIFT_DAYS) as u64) as i64;
    if offset < MAX_DATE_SHIFT_DAYS {
        offset - MAX_DATE_SHIFT_DAYS
    } else {
        offset - MAX_DATE_SHIFT_DAYS + 1
    }
}
