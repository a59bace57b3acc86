//! Builders for tasks and principals.

use chrono::{DateTime, TimeZone, Utc};

use tollgate_core::{
    ApprovalSpec, ApprovalTask, ApproverEntry, Principal, VoteInput, digest,
};

/// Fixed creation time used by fixtures: 2026-01-01T00:00:00Z.
///
/// # Panics
///
/// Never; the date is valid.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("valid date")
}

/// A principal with no group claims.
#[must_use]
pub fn user(name: &str) -> Principal {
    Principal::new(name)
}

/// A principal claiming membership of `groups`.
#[must_use]
pub fn member_of(name: &str, groups: &[&str]) -> Principal {
    groups
        .iter()
        .fold(Principal::new(name), |p, g| p.with_group(*g))
}

/// A group entry with the given member votes.
#[must_use]
pub fn group(name: &str, members: &[(&str, VoteInput)]) -> ApproverEntry {
    members
        .iter()
        .fold(ApproverEntry::group(name), |entry, (member, input)| {
            entry.with_member(*member, input.clone())
        })
}

/// Builder for [`ApprovalTask`] fixtures.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: String,
    namespace: Option<String>,
    approvers: Vec<ApproverEntry>,
    required: i64,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TaskBuilder {
    /// Start a task named `name` requiring one approval.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            approvers: Vec::new(),
            required: 1,
            description: None,
            created_at: test_epoch(),
        }
    }

    /// Add a pending user entry.
    #[must_use]
    pub fn user(self, name: &str) -> Self {
        self.approver(ApproverEntry::user(name))
    }

    /// Add a user entry that has already voted.
    #[must_use]
    pub fn user_voted(self, name: &str, input: VoteInput) -> Self {
        self.approver(ApproverEntry::user(name).with_input(input))
    }

    /// Add a group entry with member votes.
    #[must_use]
    pub fn group(self, name: &str, members: &[(&str, VoteInput)]) -> Self {
        self.approver(group(name, members))
    }

    /// Add any entry.
    #[must_use]
    pub fn approver(mut self, entry: ApproverEntry) -> Self {
        self.approvers.push(entry);
        self
    }

    /// Set the approval threshold.
    #[must_use]
    pub fn required(mut self, required: i64) -> Self {
        self.required = required;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the creation time.
    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// The spec alone.
    #[must_use]
    pub fn spec(&self) -> ApprovalSpec {
        ApprovalSpec {
            approvers: self.approvers.clone(),
            required_approvals: self.required,
            description: self.description.clone(),
        }
    }

    /// Build a task with an initial status and no digest annotation.
    #[must_use]
    pub fn build(self) -> ApprovalTask {
        let mut task = ApprovalTask::new(self.name.clone(), self.spec());
        task.metadata.namespace = self.namespace;
        task.metadata.creation_timestamp = Some(self.created_at);
        task
    }

    /// Build a task stamped with its approver digest, as bootstrap does.
    #[must_use]
    pub fn build_stamped(self) -> ApprovalTask {
        let mut task = self.build();
        task.set_last_applied_digest(digest(&task.spec.approvers));
        task
    }
}
