//! Admission review for approval task writes.
//!
//! Every CREATE and UPDATE of an approval task passes through
//! [`AdmissionController::admit`] before the store accepts it. Objects
//! arrive JSON encoded, the way an admission webhook receives them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{info, warn};

use tollgate_core::{ApprovalTask, Decision, Principal, authorize, validate_for_create, validate_spec};
use tollgate_telemetry::{RequestContext, RequestGuard};

/// Operation under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Object creation.
    Create,
    /// Object replacement.
    Update,
    /// Object deletion.
    Delete,
    /// Connect to a subresource.
    Connect,
}

impl Operation {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// What is being done.
    pub operation: Operation,
    /// Who is doing it, with resolved group memberships.
    pub user_info: Principal,
    /// The proposed object.
    #[serde(default)]
    pub object: Value,
    /// The stored object, for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Value>,
}

impl AdmissionRequest {
    /// Request to create `task`.
    ///
    /// # Errors
    ///
    /// Returns an error if the task cannot be encoded.
    pub fn create(user_info: Principal, task: &ApprovalTask) -> serde_json::Result<Self> {
        Ok(Self {
            operation: Operation::Create,
            user_info,
            object: serde_json::to_value(task)?,
            old_object: None,
        })
    }

    /// Request to replace `old` with `new`.
    ///
    /// # Errors
    ///
    /// Returns an error if either task cannot be encoded.
    pub fn update(
        user_info: Principal,
        new: &ApprovalTask,
        old: &ApprovalTask,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            operation: Operation::Update,
            user_info,
            object: serde_json::to_value(new)?,
            old_object: Some(serde_json::to_value(old)?),
        })
    }
}

/// Outcome of a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    /// Whether the write may proceed.
    pub allowed: bool,
    /// Why it may not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AdmissionResponse {
    /// Allow the write.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: None,
        }
    }

    /// Deny the write.
    #[must_use]
    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: Some(message.into()),
        }
    }
}

impl From<Decision> for AdmissionResponse {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self::allow(),
            Decision::Deny { reason } => Self::deny(reason),
        }
    }
}

/// Runs the validator, then the authorization guard, on incoming writes.
///
/// Status writes never come through here; the reconciler writes status
/// directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmissionController;

impl AdmissionController {
    /// Create a controller.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Review a write.
    #[must_use]
    pub fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse {
        let ctx = RequestContext::new("admission")
            .with_operation(request.operation.as_str())
            .with_principal(request.user_info.username.clone());
        let _guard = RequestGuard::new(ctx);

        let response = review(request);
        if response.allowed {
            info!(operation = %request.operation, "Admitted approval task write");
        } else {
            warn!(
                operation = %request.operation,
                reason = response.message.as_deref().unwrap_or_default(),
                "Denied approval task write"
            );
        }
        response
    }
}

fn review(request: &AdmissionRequest) -> AdmissionResponse {
    let new: ApprovalTask = match serde_json::from_value(request.object.clone()) {
        Ok(task) => task,
        Err(e) => return AdmissionResponse::deny(format!("cannot decode incoming new object: {e}")),
    };
    tracing::Span::current().record("task", new.key().as_str());

    if let Err(errors) = validate_spec(&new.spec) {
        return AdmissionResponse::deny(format!("validation failed: {errors}"));
    }

    match request.operation {
        Operation::Create => match validate_for_create(&new.spec) {
            Ok(()) => AdmissionResponse::allow(),
            Err(errors) => AdmissionResponse::deny(format!("validation failed: {errors}")),
        },
        Operation::Update => {
            let raw_old = request.old_object.clone().unwrap_or(Value::Null);
            let old: ApprovalTask = match serde_json::from_value(raw_old) {
                Ok(task) => task,
                Err(e) => {
                    return AdmissionResponse::deny(format!(
                        "cannot decode incoming old object: {e}"
                    ));
                },
            };
            authorize(&old, &new.spec, &request.user_info).into()
        },
        other => AdmissionResponse::deny(format!("unsupported operation: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::guard::{FINAL_STATE, NOT_AN_APPROVER, ONLY_OWN_INPUT};
    use tollgate_core::{ApprovalSpec, ApprovalState, ApproverEntry, VoteInput};

    fn stored() -> ApprovalTask {
        ApprovalTask::new(
            "deploy-gate",
            ApprovalSpec::new(
                vec![ApproverEntry::user("alice"), ApproverEntry::user("bob")],
                2,
            ),
        )
    }

    fn update(principal: &str, new: &ApprovalTask, old: &ApprovalTask) -> AdmissionResponse {
        let request = AdmissionRequest::update(Principal::new(principal), new, old).unwrap();
        AdmissionController::new().admit(&request)
    }

    // ---------------------------------------------------------------------
    // CREATE
    // ---------------------------------------------------------------------

    #[test]
    fn test_create_all_pending_allowed() {
        let request = AdmissionRequest::create(Principal::new("ci-bot"), &stored()).unwrap();
        assert_eq!(AdmissionController::new().admit(&request), AdmissionResponse::allow());
    }

    #[test]
    fn test_create_with_decided_input_denied() {
        let mut task = stored();
        task.spec.approvers[1].input = VoteInput::Approve;
        let request = AdmissionRequest::create(Principal::new("ci-bot"), &task).unwrap();
        let response = AdmissionController::new().admit(&request);
        assert!(!response.allowed);
        assert_eq!(
            response.message.as_deref(),
            Some("validation failed: approvers[1].input: must be 'pending' for new ApprovalTask, got 'approve'")
        );
    }

    #[test]
    fn test_create_structurally_invalid_denied() {
        let mut task = stored();
        task.spec.required_approvals = 0;
        let request = AdmissionRequest::create(Principal::new("ci-bot"), &task).unwrap();
        let response = AdmissionController::new().admit(&request);
        assert_eq!(
            response.message.as_deref(),
            Some("validation failed: numberOfApprovalsRequired: must be greater than 0, got 0")
        );
    }

    // ---------------------------------------------------------------------
    // UPDATE
    // ---------------------------------------------------------------------

    #[test]
    fn test_update_own_vote_allowed() {
        let old = stored();
        let mut new = old.clone();
        new.spec.approvers[0].input = VoteInput::Approve;
        assert!(update("alice", &new, &old).allowed);
    }

    #[test]
    fn test_update_foreign_vote_denied() {
        let old = stored();
        let mut new = old.clone();
        new.spec.approvers[1].input = VoteInput::Approve;
        let response = update("alice", &new, &old);
        assert_eq!(response.message.as_deref(), Some(ONLY_OWN_INPUT));
    }

    #[test]
    fn test_update_by_stranger_denied() {
        let old = stored();
        let mut new = old.clone();
        new.spec.approvers[0].input = VoteInput::Approve;
        let response = update("mallory", &new, &old);
        assert_eq!(response.message.as_deref(), Some(NOT_AN_APPROVER));
    }

    #[test]
    fn test_update_terminal_task_denied() {
        let mut old = stored();
        old.status.state = ApprovalState::Rejected;
        let mut new = old.clone();
        new.spec.approvers[0].input = VoteInput::Approve;
        let response = update("alice", &new, &old);
        assert_eq!(response.message.as_deref(), Some(FINAL_STATE));
    }

    #[test]
    fn test_update_validation_runs_before_guard() {
        let old = stored();
        let mut new = old.clone();
        new.spec.approvers[0].input = VoteInput::Other("maybe".to_string());
        let response = update("alice", &new, &old);
        assert_eq!(
            response.message.as_deref(),
            Some("validation failed: approvers[0].input: must be one of: pending, approve, reject, got 'maybe'")
        );
    }

    #[test]
    fn test_update_missing_old_object() {
        let request = AdmissionRequest {
            operation: Operation::Update,
            user_info: Principal::new("alice"),
            object: serde_json::to_value(stored()).unwrap(),
            old_object: None,
        };
        let response = AdmissionController::new().admit(&request);
        assert!(
            response
                .message
                .unwrap()
                .starts_with("cannot decode incoming old object: ")
        );
    }

    // ---------------------------------------------------------------------
    // Malformed requests
    // ---------------------------------------------------------------------

    #[test]
    fn test_undecodable_object() {
        let request = AdmissionRequest {
            operation: Operation::Create,
            user_info: Principal::new("alice"),
            object: serde_json::json!({ "spec": { "approvers": "nope" } }),
            old_object: None,
        };
        let response = AdmissionController::new().admit(&request);
        assert!(!response.allowed);
        assert!(
            response
                .message
                .unwrap()
                .starts_with("cannot decode incoming new object: ")
        );
    }

    #[test]
    fn test_unsupported_operation() {
        let request = AdmissionRequest {
            operation: Operation::Delete,
            user_info: Principal::new("alice"),
            object: serde_json::to_value(stored()).unwrap(),
            old_object: None,
        };
        let response = AdmissionController::new().admit(&request);
        assert_eq!(
            response.message.as_deref(),
            Some("unsupported operation: DELETE")
        );
    }

    #[test]
    fn test_request_wire_format() {
        let request = AdmissionRequest::update(Principal::new("alice"), &stored(), &stored()).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["operation"], "UPDATE");
        assert_eq!(json["userInfo"]["username"], "alice");
        assert!(json["oldObject"].is_object());
    }
}
