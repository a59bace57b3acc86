//! Tollgate Controller - storage, reconciliation and admission for
//! approval tasks.
//!
//! This crate wires the pure logic in `tollgate-core` into a running gate:
//!
//! - [`ResourceStore`] with a compare-and-swap [`MemoryStore`]
//! - [`Reconciler`], which re-aggregates a task when its approver digest
//!   changes and rejects it once the deadline passes
//! - [`AdmissionController`], which validates and authorizes every write
//! - [`TaskParams`], which turns run parameters into a new task
//! - [`VoteClient`], which casts a principal's vote with conflict retry
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tollgate_controller::prelude::*;
//! use tollgate_core::{Principal, VoteInput};
//!
//! # async fn run() -> ControllerResult<()> {
//! let store = MemoryStore::new().shared();
//! let task = TaskParams::from_params(&[
//!     Param::array("approvers", ["alice", "group:release"]),
//!     Param::string("numberOfApprovalsRequired", "2"),
//! ])?
//! .into_task("release-42", chrono::Utc::now())?;
//! store.create(task).await?;
//!
//! let client = VoteClient::new(Arc::clone(&store));
//! client
//!     .vote("release-42", &Principal::new("alice"), VoteInput::Approve, None)
//!     .await?;
//!
//! let reconciler = Reconciler::new(store, Arc::new(SystemClock));
//! let outcome = reconciler.reconcile("release-42").await?;
//! println!("{:?}", outcome.state);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod admission;
pub mod bootstrap;
pub mod client;
pub mod clock;
pub mod error;
pub mod reconciler;
pub mod store;

pub use admission::{AdmissionController, AdmissionRequest, AdmissionResponse, Operation};
pub use bootstrap::{Param, ParamValue, TaskParams};
pub use client::VoteClient;
pub use clock::{Clock, SystemClock};
pub use error::{ControllerError, ControllerResult, StoreError, StoreResult};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use store::{MemoryStore, ResourceStore};
