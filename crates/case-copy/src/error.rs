//! Error types for CaseCopy.
//!
//! Only request-level problems surface as `Err`. Per-case problems
//! (ownership conflicts, sink rejections) are accumulated as strings in
//! `CopyResult::errors` and never abort a copy.

/// Copy error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("Target owner is required")]
    MissingTargetOwner,

    #[error("Unknown de-identification transform: {0}")]
    UnknownTransform(String),

    #[error("Field cannot be de-identified: {0}")]
    ReservedField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Case not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CopyError {
    /// Whether this is a caller-configuration mistake rather than a data
    /// or I/O problem. These are detected before any store or sink access.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingTargetOwner
                | Self::UnknownTransform(_)
                | Self::ReservedField(_)
                | Self::InvalidConfig(_)
        )
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CopyError>;
