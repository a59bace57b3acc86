//! Casting a principal's vote.
//!
//! A vote is a read, an edit of the principal's own slot, an admission
//! review and a compare-and-swap write. When the write loses a race the
//! whole sequence runs again against the fresh object, so the guard always
//! judges the state the write will actually replace.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tollgate_core::{ApprovalSpec, ApprovalTask, ApproverKind, Principal, UserVote, VoteInput};
use tollgate_telemetry::RequestContext;

use crate::admission::{AdmissionController, AdmissionRequest};
use crate::error::{ControllerError, ControllerResult, StoreError};
use crate::store::ResourceStore;

/// Conflict retries when none are configured.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Writes votes through admission with conflict retry.
#[derive(Debug)]
pub struct VoteClient<S: ?Sized> {
    store: Arc<S>,
    admission: AdmissionController,
    max_retries: u32,
}

impl<S: ResourceStore + ?Sized> VoteClient<S> {
    /// Create a client over `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            admission: AdmissionController::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set how many times a conflicting write is retried.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Record `principal`'s `input` on the task stored under `key`.
    ///
    /// A direct user entry for the principal takes precedence. Otherwise the
    /// first group the principal belongs to gets (or updates) a member record
    /// for them, and the group-level input follows it. `message`, when
    /// given, replaces the slot's message.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::NoVoteSlot`] if the principal has nowhere to vote
    /// - [`ControllerError::Denied`] with the admission reason
    /// - [`ControllerError::RetriesExhausted`] if every write conflicted
    /// - [`ControllerError::Store`] for other storage failures
    pub async fn vote(
        &self,
        key: &str,
        principal: &Principal,
        input: VoteInput,
        message: Option<&str>,
    ) -> ControllerResult<ApprovalTask> {
        RequestContext::new("client")
            .with_operation("vote")
            .with_task(key)
            .with_principal(principal.username.clone())
            .scope(self.cast(key, principal, input, message))
            .await
    }

    async fn cast(
        &self,
        key: &str,
        principal: &Principal,
        input: VoteInput,
        message: Option<&str>,
    ) -> ControllerResult<ApprovalTask> {
        let attempts = self.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let current = self.store.get(key).await?;
            let mut proposed = current.clone();
            if !apply_vote(&mut proposed.spec, principal, &input, message) {
                return Err(ControllerError::NoVoteSlot {
                    task: key.to_owned(),
                    principal: principal.username.clone(),
                });
            }

            let request = AdmissionRequest::update(principal.clone(), &proposed, &current)?;
            let response = self.admission.admit(&request);
            if !response.allowed {
                return Err(ControllerError::Denied(response.message.unwrap_or_default()));
            }

            match self.store.update(proposed).await {
                Ok(task) => {
                    info!(%input, attempt, "Vote recorded");
                    return Ok(task);
                },
                Err(StoreError::Conflict {
                    expected, actual, ..
                }) => {
                    warn!(attempt, expected, actual, "Vote lost a write race, retrying");
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(ControllerError::RetriesExhausted {
            key: key.to_owned(),
            attempts,
        })
    }
}

/// Edit `principal`'s own slot in `spec`. Returns false if there is none.
fn apply_vote(
    spec: &mut ApprovalSpec,
    principal: &Principal,
    input: &VoteInput,
    message: Option<&str>,
) -> bool {
    if let Some(entry) = spec.entry_mut(&ApproverKind::User, &principal.username) {
        debug!(slot = "user", "Voting through user entry");
        entry.input = input.clone();
        if let Some(message) = message {
            entry.message = Some(message.to_owned());
        }
        return true;
    }

    let group = spec.approvers.iter_mut().find(|entry| {
        entry.is_group()
            && (principal.in_group(&entry.name) || entry.member(&principal.username).is_some())
    });
    let Some(group) = group else {
        return false;
    };

    debug!(slot = "group", group = %group.name, "Voting through group membership");
    match group
        .members
        .iter_mut()
        .find(|m| m.name == principal.username)
    {
        Some(member) => member.input = input.clone(),
        None => group
            .members
            .push(UserVote::new(principal.username.clone(), input.clone())),
    }
    group.input = input.clone();
    if let Some(message) = message {
        group.message = Some(message.to_owned());
    }
    true
}
