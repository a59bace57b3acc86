//! Commonly used types.
//!
//! Use `use tollgate_controller::prelude::*;` to import them all.

pub use crate::{ControllerError, ControllerResult, StoreError, StoreResult};

pub use crate::{MemoryStore, ResourceStore};

pub use crate::{Clock, SystemClock};

pub use crate::{AdmissionController, AdmissionRequest, AdmissionResponse, Operation};

pub use crate::{Param, ParamValue, TaskParams};

pub use crate::{ReconcileOutcome, Reconciler, VoteClient};
