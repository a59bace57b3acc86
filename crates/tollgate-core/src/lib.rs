//! Tollgate Core - Multi-party approval aggregation and authorization.
//!
//! An approval task lists the principals (users or named groups) whose
//! decisions gate some action, and how many distinct approvals are needed.
//! This crate holds the pure logic behind such a gate:
//!
//! - [`validate`]: structural checks on a proposed spec, with field paths
//! - [`aggregate`]: turning votes into `Pending`, `Approved` or `Rejected`
//! - [`digest`]: a content digest that tells a reconciler when to re-aggregate
//! - [`timeout`]: deadline evaluation against a caller-supplied clock
//! - [`guard`]: deciding whether an edit is the acting principal's own vote
//!
//! Nothing here performs I/O or reads the clock; storage, scheduling and
//! admission transport live in `tollgate-controller`.
//!
//! # Example
//!
//! ```
//! use tollgate_core::prelude::*;
//!
//! let spec = ApprovalSpec::new(
//!     vec![
//!         ApproverEntry::user("alice").with_input(VoteInput::Approve),
//!         ApproverEntry::user("bob"),
//!     ],
//!     2,
//! );
//! validate_spec(&spec).unwrap();
//!
//! let status = aggregate(&spec, None);
//! assert_eq!(status.state, ApprovalState::Pending);
//! assert_eq!(status.received, 1);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod aggregate;
pub mod digest;
/// Validation error types.
pub mod error;
pub mod guard;
pub mod model;
pub mod timeout;
pub mod validate;

pub use aggregate::{Tally, aggregate, tally};
pub use digest::{ApproverDigest, digest};
pub use error::{FieldError, ValidationErrors, ValidationResult};
pub use guard::{Decision, authorize};
pub use model::{
    AggregatedEntry, ApprovalSpec, ApprovalState, ApprovalStatus, ApprovalTask, ApproverEntry,
    ApproverKind, GroupMemberState, LAST_APPLIED_HASH_KEY, ObjectMeta, Principal, UserVote,
    VoteInput,
};
pub use timeout::{DEFAULT_TIMEOUT, has_timed_out, remaining, timeout_reason};
pub use validate::{validate_for_create, validate_spec};
