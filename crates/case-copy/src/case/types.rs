//! Data structures for cases and the shells built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Case identifier
// ---------------------------------------------------------------------------

/// Opaque case identifier, unique within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Index references
// ---------------------------------------------------------------------------

/// Kind of link between a case and its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Ordinary parent/child link.
    Child,
    /// The case extends its host and lives or dies with it.
    Extension,
}

impl Relationship {
    /// Return a stable string tag.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Child => "child",
            Self::Extension => "extension",
        }
    }
}

/// A named reference from a case to a parent case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRef {
    pub referenced_case_type: String,
    pub referenced_case_id: CaseId,
    pub relationship: Relationship,
}

impl IndexRef {
    /// A `child` reference to `case_id` of type `case_type`.
    pub fn child(case_type: impl Into<String>, case_id: impl Into<String>) -> Self {
        Self {
            referenced_case_type: case_type.into(),
            referenced_case_id: CaseId(case_id.into()),
            relationship: Relationship::Child,
        }
    }

    /// An `extension` reference to `case_id` of type `case_type`.
    pub fn extension(case_type: impl Into<String>, case_id: impl Into<String>) -> Self {
        Self {
            relationship: Relationship::Extension,
            ..Self::child(case_type, case_id)
        }
    }

    /// The same reference pointed at a different case.
    pub fn retarget(&self, case_id: CaseId) -> Self {
        Self {
            referenced_case_id: case_id,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

/// Immutable snapshot of a case as read from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: CaseId,
    pub domain: String,
    pub case_type: String,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub date_opened: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Relation identifier (e.g. `"parent"`, `"host"`) to parent reference.
    #[serde(default)]
    pub indices: BTreeMap<String, IndexRef>,
}

impl Case {
    /// A case with no optional attributes, properties or indices.
    pub fn new(
        domain: impl Into<String>,
        case_id: impl Into<String>,
        case_type: impl Into<String>,
        name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            case_id: CaseId(case_id.into()),
            domain: domain.into(),
            case_type: case_type.into(),
            name: name.into(),
            external_id: None,
            date_opened: None,
            owner_id: owner_id.into(),
            properties: BTreeMap::new(),
            indices: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_index(mut self, identifier: impl Into<String>, index: IndexRef) -> Self {
        self.indices.insert(identifier.into(), index);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_date_opened(mut self, date_opened: impl Into<String>) -> Self {
        self.date_opened = Some(date_opened.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Case shell
// ---------------------------------------------------------------------------

/// A new case built from an original, not yet persisted.
///
/// `indices` only ever point at `new_case_id`s of other shells built in
/// the same copy call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseShell {
    pub new_case_id: CaseId,
    pub original_case_id: CaseId,
    pub domain: String,
    pub case_type: String,
    pub name: String,
    pub external_id: Option<String>,
    pub date_opened: Option<String>,
    pub owner_id: String,
    pub properties: BTreeMap<String, String>,
    pub indices: BTreeMap<String, IndexRef>,
}

impl CaseShell {
    /// The case this shell becomes once persisted.
    pub fn to_case(&self) -> Case {
        Case {
            case_id: self.new_case_id.clone(),
            domain: self.domain.clone(),
            case_type: self.case_type.clone(),
            name: self.name.clone(),
            external_id: self.external_id.clone(),
            date_opened: self.date_opened.clone(),
            owner_id: self.owner_id.clone(),
            properties: self.properties.clone(),
            indices: self.indices.clone(),
        }
    }
}
