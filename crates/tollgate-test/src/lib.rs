//! Tollgate Test - shared fixtures for Tollgate tests.
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tollgate-test.workspace = true
//! ```
//!
//! Then drive a gate end to end:
//!
//! ```rust,ignore
//! use tollgate_test::prelude::*;
//! use tollgate_core::{ApprovalState, VoteInput};
//!
//! #[tokio::test]
//! async fn test_two_approvals() {
//!     let gate = Gate::new(TaskBuilder::new("gate").user("alice").user("bob").required(2).build()).await;
//!     gate.vote(&user("alice"), VoteInput::Approve).await.unwrap();
//!     gate.vote(&user("bob"), VoteInput::Approve).await.unwrap();
//!     assert_eq!(gate.reconcile().await.state, ApprovalState::Approved);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod clock;
pub mod fixtures;
pub mod harness;

pub use clock::*;
pub use fixtures::*;
pub use harness::*;
