//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_core::prelude::*;` to import the data model and every
//! entry point.

// Data model
pub use crate::{
    AggregatedEntry, ApprovalSpec, ApprovalState, ApprovalStatus, ApprovalTask, ApproverEntry,
    ApproverKind, GroupMemberState, ObjectMeta, Principal, UserVote, VoteInput,
};

// Errors
pub use crate::{FieldError, ValidationErrors, ValidationResult};

// Entry points
pub use crate::{
    ApproverDigest, Decision, aggregate, authorize, digest, has_timed_out, validate_for_create,
    validate_spec,
};
