//! Structural validation of approval specs.
//!
//! Validation collects every problem in document order. The first error is
//! what callers render; the rest are available for tooling that wants the
//! full picture.

use std::collections::HashMap;

use crate::error::{FieldError, ValidationErrors, ValidationResult};
use crate::model::{ApprovalSpec, ApproverEntry, ApproverKind, GROUP_PREFIX, VoteInput};

const SUPPORTED_INPUTS: &str = "pending, approve, reject";

/// Validate a spec proposed as the desired state of an existing task.
///
/// # Errors
///
/// Returns every structural problem found, in document order.
pub fn validate_spec(spec: &ApprovalSpec) -> ValidationResult<()> {
    let mut errors = Vec::new();
    check_spec(spec, &mut errors);
    finish(errors)
}

/// Validate a spec for a newly created task.
///
/// Applies [`validate_spec`] and additionally requires every input, including
/// member inputs, to be `pending`.
///
/// # Errors
///
/// Returns every structural problem found, in document order.
pub fn validate_for_create(spec: &ApprovalSpec) -> ValidationResult<()> {
    let mut errors = Vec::new();
    check_spec(spec, &mut errors);

    for (i, entry) in spec.approvers.iter().enumerate() {
        if entry.input != VoteInput::Pending {
            errors.push(FieldError::new(
                format!("approvers[{i}].input"),
                format!(
                    "must be 'pending' for new ApprovalTask, got '{}'",
                    entry.input
                ),
            ));
        }
        for (j, member) in entry.members.iter().enumerate() {
            if member.input != VoteInput::Pending {
                errors.push(FieldError::new(
                    format!("approvers[{i}].users[{j}].input"),
                    format!(
                        "must be 'pending' for new ApprovalTask, got '{}'",
                        member.input
                    ),
                ));
            }
        }
    }

    finish(errors)
}

fn finish(errors: Vec<FieldError>) -> ValidationResult<()> {
    match ValidationErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

fn check_spec(spec: &ApprovalSpec, errors: &mut Vec<FieldError>) {
    if spec.required_approvals <= 0 {
        errors.push(FieldError::new(
            "numberOfApprovalsRequired",
            format!("must be greater than 0, got {}", spec.required_approvals),
        ));
    }

    if spec.approvers.is_empty() {
        errors.push(FieldError::new("approvers", "required field is missing"));
        return;
    }

    let mut seen: HashMap<(&ApproverKind, &str), usize> = HashMap::new();
    for (i, entry) in spec.approvers.iter().enumerate() {
        let path = format!("approvers[{i}]");
        check_entry(entry, &path, errors);

        if let Some(first) = seen.get(&(&entry.kind, entry.name.as_str())) {
            errors.push(FieldError::new(
                format!("{path}.name"),
                format!(
                    "duplicate approver '{}' (also found at approvers[{first}])",
                    entry.name
                ),
            ));
        } else {
            seen.insert((&entry.kind, entry.name.as_str()), i);
        }
    }
}

fn check_entry(entry: &ApproverEntry, path: &str, errors: &mut Vec<FieldError>) {
    match &entry.kind {
        ApproverKind::User => {
            if let Err(message) = check_user_name(&entry.name) {
                errors.push(FieldError::new(format!("{path}.name"), message));
            }
        },
        ApproverKind::Group => {
            if let Err(message) = check_group_name(&entry.name) {
                errors.push(FieldError::new(format!("{path}.name"), message));
            }
        },
        ApproverKind::Other(raw) => {
            errors.push(FieldError::new(
                format!("{path}.type"),
                format!("must be either 'User' or 'Group', got '{raw}'"),
            ));
        },
    }

    if !entry.input.is_known() {
        errors.push(invalid_input(format!("{path}.input"), &entry.input));
    }

    if entry.members.is_empty() {
        return;
    }
    if entry.kind != ApproverKind::Group {
        errors.push(FieldError::new(
            format!("{path}.users"),
            "only allowed for approvers of type 'Group'",
        ));
        return;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (j, member) in entry.members.iter().enumerate() {
        let member_path = format!("{path}.users[{j}]");
        if member.name.trim().is_empty() {
            errors.push(FieldError::new(
                format!("{member_path}.name"),
                "required field is missing",
            ));
        } else if let Err(message) = check_user_name(&member.name) {
            errors.push(FieldError::new(format!("{member_path}.name"), message));
        }

        if let Some(first) = seen.get(member.name.as_str()) {
            errors.push(FieldError::new(
                format!("{member_path}.name"),
                format!(
                    "duplicate user '{}' within group (also found at {path}.users[{first}])",
                    member.name
                ),
            ));
        } else {
            seen.insert(member.name.as_str(), j);
        }

        if !member.input.is_known() {
            errors.push(invalid_input(format!("{member_path}.input"), &member.input));
        }
    }
}

fn invalid_input(path: String, input: &VoteInput) -> FieldError {
    FieldError::new(
        path,
        format!("must be one of: {SUPPORTED_INPUTS}, got '{input}'"),
    )
}

/// User names may carry identity-scheme prefixes (`oauth:alice`,
/// `system:serviceaccount:ns:sa`) and spaces, but not the group prefix.
fn check_user_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("username cannot be empty");
    }
    if name.starts_with(GROUP_PREFIX) {
        return Err("username cannot start with 'group:' prefix - use type: Group for group approvers");
    }
    Ok(())
}

fn check_group_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("group name cannot be empty");
    }
    if name.chars().any(char::is_whitespace) {
        return Err("group name cannot contain spaces");
    }
    if name.contains(':') {
        return Err("group name cannot contain colons");
    }
    Ok(())
}
