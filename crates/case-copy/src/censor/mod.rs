//! Field-level de-identification.
//!
//! - [`transforms`]: the transform registry and built-in masking functions.
//! - [`apply`]: censor maps compiled into plans and applied to cases.

pub mod apply;
pub mod transforms;

pub use apply::{
    apply, AttributeOverrides, CaseAttribute, CensorMap, CensorPlan, CensorTarget, Overrides,
    RESERVED_FIELDS,
};
pub use transforms::{DeidTransforms, TransformFn, TransformRegistry};
