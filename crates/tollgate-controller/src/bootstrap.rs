//! Building a fresh approval task from run parameters.
//!
//! A pipeline run asks for approval by passing three parameters:
//!
//! | Name | Value |
//! |------|-------|
//! | `approvers` | array of names; `group:<name>` marks a group |
//! | `numberOfApprovalsRequired` | positive integer, default 1 |
//! | `description` | free text |
//!
//! `approvers` may also be given as a single string holding a JSON array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use tollgate_core::model::GROUP_PREFIX;
use tollgate_core::{
    ApprovalSpec, ApprovalStatus, ApprovalTask, ApproverEntry, ObjectMeta, digest,
    validate_for_create,
};

use crate::error::{ControllerError, ControllerResult};

/// Parameter carrying the approver list.
pub const APPROVERS_PARAM: &str = "approvers";
/// Parameter carrying the approval threshold.
pub const REQUIRED_PARAM: &str = "numberOfApprovalsRequired";
/// Parameter carrying the description.
pub const DESCRIPTION_PARAM: &str = "description";
/// Label linking a task back to the run that requested it.
pub const CUSTOM_RUN_LABEL: &str = "tekton.dev/customRun";

/// A named run parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: ParamValue,
}

impl Param {
    /// A string-valued parameter.
    #[must_use]
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::String(value.into()),
        }
    }

    /// An array-valued parameter.
    #[must_use]
    pub fn array<I, T>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            value: ParamValue::Array(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// A run parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A single string.
    String(String),
    /// A list of strings.
    Array(Vec<String>),
}

/// Parsed and checked run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParams {
    /// Approvers in parameter order, duplicates dropped.
    pub approvers: Vec<ApproverEntry>,
    /// Approval threshold.
    pub required_approvals: i64,
    /// Optional description.
    pub description: Option<String>,
}

impl TaskParams {
    /// Parse run parameters. Unknown parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidParams`] naming the first problem.
    pub fn from_params(params: &[Param]) -> ControllerResult<Self> {
        let mut approvers = None;
        let mut required_approvals = 1;
        let mut description = None;

        for param in params {
            match param.name.as_str() {
                APPROVERS_PARAM => approvers = Some(parse_approvers(&param.value)?),
                REQUIRED_PARAM => required_approvals = parse_required(&param.value)?,
                DESCRIPTION_PARAM => match &param.value {
                    ParamValue::String(s) if !s.is_empty() => description = Some(s.clone()),
                    ParamValue::String(_) => {},
                    ParamValue::Array(_) => {
                        return Err(ControllerError::InvalidParams(
                            "invalid description parameter: expected a string".to_owned(),
                        ));
                    },
                },
                other => debug!(param = other, "Ignoring unknown parameter"),
            }
        }

        let approvers = approvers.unwrap_or_default();
        if approvers.is_empty() {
            return Err(ControllerError::InvalidParams(
                "no valid approvers found - at least one approver is required".to_owned(),
            ));
        }

        Ok(Self {
            approvers,
            required_approvals,
            description,
        })
    }

    /// Build an all-pending task named `name`, created at `now`.
    ///
    /// The task carries the digest of its approver list, so the first
    /// reconcile pass does not re-aggregate it.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Validation`] if the resulting spec is not
    /// a valid new task.
    pub fn into_task(self, name: impl Into<String>, now: DateTime<Utc>) -> ControllerResult<ApprovalTask> {
        let name = name.into();
        let spec = ApprovalSpec {
            approvers: self.approvers,
            required_approvals: self.required_approvals,
            description: self.description,
        };
        validate_for_create(&spec)?;

        let mut metadata = ObjectMeta::named(name.clone());
        metadata.creation_timestamp = Some(now);
        metadata.labels.insert(CUSTOM_RUN_LABEL.to_owned(), name);

        let mut task = ApprovalTask {
            metadata,
            status: ApprovalStatus::initial(&spec),
            spec,
        };
        task.set_last_applied_digest(digest(&task.spec.approvers));
        Ok(task)
    }
}

fn parse_approvers(value: &ParamValue) -> ControllerResult<Vec<ApproverEntry>> {
    let raw: Vec<serde_json::Value> = match value {
        ParamValue::Array(items) => items.iter().cloned().map(serde_json::Value::String).collect(),
        ParamValue::String(s) if s.is_empty() => Vec::new(),
        ParamValue::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(serde_json::Value::Array(items)) => items,
            Ok(_) => return Err(invalid_approvers("expected an array of approvers")),
            Err(e) => return Err(invalid_approvers(&format!("failed to parse JSON '{s}' - {e}"))),
        },
    };

    let mut seen = BTreeSet::new();
    let mut approvers = Vec::with_capacity(raw.len());
    for (i, item) in raw.iter().enumerate() {
        let entry = match item {
            serde_json::Value::String(name) => parse_approver(name, i)?,
            serde_json::Value::Object(map) => {
                return Err(invalid_approvers(&match map.get("group") {
                    Some(serde_json::Value::String(group)) => format!(
                        "approvers[{i}]: invalid group format {{\"group\":\"{group}\"}} - use 'group:{group}' format instead"
                    ),
                    Some(_) => format!("approvers[{i}]: invalid group specification"),
                    None => format!(
                        "approvers[{i}]: invalid object format {item} - approver must be a string, not an object"
                    ),
                }));
            },
            _ => {
                return Err(invalid_approvers(&format!(
                    "approvers[{i}]: invalid approver format - must be a string"
                )));
            },
        };
        if seen.insert((entry.kind.clone(), entry.name.clone())) {
            approvers.push(entry);
        } else {
            debug!(approver = %entry.name, "Dropping duplicate approver");
        }
    }
    Ok(approvers)
}

fn parse_approver(raw: &str, index: usize) -> ControllerResult<ApproverEntry> {
    if raw.trim().is_empty() {
        return Err(invalid_approvers(&format!(
            "approvers[{index}]: approver name cannot be empty"
        )));
    }
    if raw.contains(" :") || raw.contains(": ") {
        return Err(invalid_approvers(&format!(
            "approvers[{index}]: invalid group format '{raw}' - use 'group:groupname' format (remove spaces around colon)"
        )));
    }

    let Some(group) = raw.strip_prefix(GROUP_PREFIX) else {
        return Ok(ApproverEntry::user(raw));
    };
    if group.trim().is_empty() {
        return Err(invalid_approvers(&format!(
            "approvers[{index}]: invalid group format '{raw}' - group name cannot be empty after 'group:'"
        )));
    }
    if group.contains(':') {
        return Err(invalid_approvers(&format!(
            "approvers[{index}]: group name '{group}' cannot contain colons"
        )));
    }
    if group.contains(' ') {
        return Err(invalid_approvers(&format!(
            "approvers[{index}]: group name '{group}' cannot contain spaces"
        )));
    }
    Ok(ApproverEntry::group(group))
}

fn parse_required(value: &ParamValue) -> ControllerResult<i64> {
    let ParamValue::String(raw) = value else {
        return Err(ControllerError::InvalidParams(
            "invalid numberOfApprovalsRequired parameter: expected a string".to_owned(),
        ));
    };
    let required: i64 = raw.trim().parse().map_err(|_| {
        ControllerError::InvalidParams(format!(
            "invalid numberOfApprovalsRequired parameter: '{raw}' is not a valid integer"
        ))
    })?;
    if required <= 0 {
        return Err(ControllerError::InvalidParams(format!(
            "invalid numberOfApprovalsRequired parameter: must be greater than 0, got {required}"
        )));
    }
    Ok(required)
}

fn invalid_approvers(detail: &str) -> ControllerError {
    ControllerError::InvalidParams(format!("invalid approvers parameter: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tollgate_core::{ApprovalState, ApproverKind, VoteInput};

    fn message(err: ControllerError) -> String {
        err.to_string()
    }

    #[test]
    fn test_parse_users_and_groups() {
        let params = TaskParams::from_params(&[
            Param::array(APPROVERS_PARAM, ["alice", "group:qa", "bob", "alice"]),
            Param::string(REQUIRED_PARAM, "2"),
            Param::string(DESCRIPTION_PARAM, "ship v2"),
        ])
        .unwrap();

        assert_eq!(
            params.approvers,
            vec![
                ApproverEntry::user("alice"),
                ApproverEntry::group("qa"),
                ApproverEntry::user("bob"),
            ]
        );
        assert_eq!(params.required_approvals, 2);
        assert_eq!(params.description.as_deref(), Some("ship v2"));
    }

    #[test]
    fn test_required_defaults_to_one() {
        let params = TaskParams::from_params(&[Param::array(APPROVERS_PARAM, ["alice"])]).unwrap();
        assert_eq!(params.required_approvals, 1);
        assert_eq!(params.description, None);
    }

    #[test]
    fn test_approvers_as_json_string() {
        let params =
            TaskParams::from_params(&[Param::string(APPROVERS_PARAM, r#"["alice","group:ops"]"#)])
                .unwrap();
        assert_eq!(params.approvers.len(), 2);
        assert_eq!(params.approvers[1].kind, ApproverKind::Group);
        assert_eq!(params.approvers[1].name, "ops");
    }

    #[test]
    fn test_malformed_group_syntax() {
        let err = TaskParams::from_params(&[Param::array(APPROVERS_PARAM, ["group : qa"])])
            .unwrap_err();
        assert_eq!(
            message(err),
            "invalid approvers parameter: approvers[0]: invalid group format 'group : qa' - use 'group:groupname' format (remove spaces around colon)"
        );

        let err =
            TaskParams::from_params(&[Param::array(APPROVERS_PARAM, ["alice", "group:"])]).unwrap_err();
        assert_eq!(
            message(err),
            "invalid approvers parameter: approvers[1]: invalid group format 'group:' - group name cannot be empty after 'group:'"
        );

        let err = TaskParams::from_params(&[Param::array(APPROVERS_PARAM, ["group:a:b"])])
            .unwrap_err();
        assert!(message(err).ends_with("group name 'a:b' cannot contain colons"));
    }

    #[test]
    fn test_object_approver_rejected() {
        let err = TaskParams::from_params(&[Param::string(
            APPROVERS_PARAM,
            r#"[{"group":"qa"}]"#,
        )])
        .unwrap_err();
        assert_eq!(
            message(err),
            "invalid approvers parameter: approvers[0]: invalid group format {\"group\":\"qa\"} - use 'group:qa' format instead"
        );
    }

    #[test]
    fn test_bad_json_and_non_array() {
        let err = TaskParams::from_params(&[Param::string(APPROVERS_PARAM, "[alice")]).unwrap_err();
        assert!(message(err).starts_with("invalid approvers parameter: failed to parse JSON '[alice' - "));

        let err = TaskParams::from_params(&[Param::string(APPROVERS_PARAM, "\"alice\"")]).unwrap_err();
        assert_eq!(
            message(err),
            "invalid approvers parameter: expected an array of approvers"
        );
    }

    #[test]
    fn test_missing_approvers() {
        let err = TaskParams::from_params(&[Param::string(REQUIRED_PARAM, "1")]).unwrap_err();
        assert_eq!(
            message(err),
            "no valid approvers found - at least one approver is required"
        );
    }

    #[test]
    fn test_required_must_be_positive_integer() {
        let approvers = Param::array(APPROVERS_PARAM, ["alice"]);
        let err = TaskParams::from_params(&[approvers.clone(), Param::string(REQUIRED_PARAM, "two")])
            .unwrap_err();
        assert_eq!(
            message(err),
            "invalid numberOfApprovalsRequired parameter: 'two' is not a valid integer"
        );

        let err = TaskParams::from_params(&[approvers, Param::string(REQUIRED_PARAM, "0")])
            .unwrap_err();
        assert_eq!(
            message(err),
            "invalid numberOfApprovalsRequired parameter: must be greater than 0, got 0"
        );
    }

    #[test]
    fn test_into_task() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
        let task = TaskParams::from_params(&[
            Param::array(APPROVERS_PARAM, ["bob", "alice", "group:qa"]),
            Param::string(REQUIRED_PARAM, "2"),
        ])
        .unwrap()
        .into_task("release-42", now)
        .unwrap();

        assert_eq!(task.metadata.name, "release-42");
        assert_eq!(task.metadata.creation_timestamp, Some(now));
        assert_eq!(
            task.metadata.labels.get(CUSTOM_RUN_LABEL).map(String::as_str),
            Some("release-42")
        );
        assert_eq!(task.last_applied_digest(), Some(digest(&task.spec.approvers)));
        assert!(task.spec.approvers.iter().all(|a| a.input == VoteInput::Pending));

        assert_eq!(task.status.state, ApprovalState::Pending);
        assert_eq!(task.status.approvers, vec!["alice", "bob", "qa"]);
        assert_eq!(task.status.required, 2);
        assert_eq!(task.status.received, 0);
        assert!(task.status.entries.is_empty());
    }

    #[test]
    fn test_into_task_rejects_prefixed_user() {
        let params = TaskParams {
            approvers: vec![ApproverEntry::user("group:qa")],
            required_approvals: 1,
            description: None,
        };
        let err = params.into_task("t", Utc::now()).unwrap_err();
        assert!(matches!(err, ControllerError::Validation(_)));
    }

    #[test]
    fn test_param_wire_format() {
        let params: Vec<Param> = serde_json::from_str(
            r#"[{"name":"approvers","value":["alice"]},{"name":"numberOfApprovalsRequired","value":"1"}]"#,
        )
        .unwrap();
        assert_eq!(params[0], Param::array(APPROVERS_PARAM, ["alice"]));
        assert_eq!(params[1], Param::string(REQUIRED_PARAM, "1"));
    }
}
