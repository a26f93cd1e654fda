//! Censor plans: a censor map compiled against a transform registry, and
//! its application to a single case.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::case::Case;
use crate::error::{CopyError, Result};

use super::transforms::{TransformFn, TransformRegistry};

/// Field name to transform name, as supplied by the caller.
pub type CensorMap = BTreeMap<String, String>;

/// Fields that identify or place a case and may never be rewritten.
pub const RESERVED_FIELDS: &[&str] = &["case_id", "domain", "case_type", "owner_id", "indices"];

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Top-level case attributes that may be de-identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseAttribute {
    Name,
    ExternalId,
    DateOpened,
}

impl CaseAttribute {
    /// Parse a censor map key naming a top-level attribute.
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "name" => Some(Self::Name),
            "external_id" => Some(Self::ExternalId),
            "date_opened" => Some(Self::DateOpened),
            _ => None,
        }
    }

    /// Return a stable string tag.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Name => "name",
            Self::ExternalId => "external_id",
            Self::DateOpened => "date_opened",
        }
    }

    /// Current value on `case`, if the attribute is present.
    pub fn value<'a>(&self, case: &'a Case) -> Option<&'a str> {
        match self {
            Self::Name => Some(case.name.as_str()),
            Self::ExternalId => case.external_id.as_deref(),
            Self::DateOpened => case.date_opened.as_deref(),
        }
    }
}

/// Where a censor rule writes its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CensorTarget {
    Attribute(CaseAttribute),
    Property(String),
}

impl CensorTarget {
    /// Classify a censor map key. Reserved fields are rejected.
    pub fn parse(field: &str) -> Result<Self> {
        if RESERVED_FIELDS.contains(&field) {
            return Err(CopyError::ReservedField(field.to_string()));
        }
        Ok(match CaseAttribute::from_field(field) {
            Some(attr) => Self::Attribute(attr),
            None => Self::Property(field.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Replacement values for top-level attributes. `None` keeps the original.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeOverrides {
    pub name: Option<String>,
    pub external_id: Option<String>,
    pub date_opened: Option<String>,
}

impl AttributeOverrides {
    fn set(&mut self, attr: CaseAttribute, value: String) {
        match attr {
            CaseAttribute::Name => self.name = Some(value),
            CaseAttribute::ExternalId => self.external_id = Some(value),
            CaseAttribute::DateOpened => self.date_opened = Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.external_id.is_none() && self.date_opened.is_none()
    }
}

/// Output of applying a censor plan to one case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub attributes: AttributeOverrides,
    pub properties: BTreeMap<String, String>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.properties.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

struct CensorRule {
    target: CensorTarget,
    transform_name: String,
    transform: TransformFn,
}

/// A censor map with every field classified and every transform resolved.
///
/// Compiling up front means unknown transforms and reserved fields are
/// reported before any case is read.
#[derive(Default)]
pub struct CensorPlan {
    rules: Vec<CensorRule>,
}

impl CensorPlan {
    /// A plan that overrides nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn compile(censor_map: &CensorMap, registry: &dyn TransformRegistry) -> Result<Self> {
        let mut rules = Vec::with_capacity(censor_map.len());
        for (field, transform_name) in censor_map {
            let target = CensorTarget::parse(field)?;
            let transform = registry.get_transform(transform_name)?;
            rules.push(CensorRule {
                target,
                transform_name: transform_name.clone(),
                transform,
            });
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Compute the masked values for `case`. Fields the case does not
    /// have are skipped.
    pub fn apply(&self, case: &Case) -> Overrides {
        let mut out = Overrides::default();
        for rule in &self.rules {
            match &rule.target {
                CensorTarget::Attribute(attr) => {
                    if let Some(value) = attr.value(case) {
                        out.attributes.set(*attr, (rule.transform)(value, case));
                    }
                }
                CensorTarget::Property(key) => {
                    if let Some(value) = case.properties.get(key) {
                        out.properties
                            .insert(key.clone(), (rule.transform)(value, case));
                    }
                }
            }
        }
        out
    }
}

impl std::fmt::Debug for CensorPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.rules
                    .iter()
                    .map(|r| (r.target.clone(), r.transform_name.as_str())),
            )
            .finish()
    }
}

/// Compile `censor_map` and apply it to `case` in one step.
pub fn apply(
    case: &Case,
    censor_map: &CensorMap,
    registry: &dyn TransformRegistry,
) -> Result<Overrides> {
    Ok(CensorPlan::compile(censor_map, registry)?.apply(case))
}
