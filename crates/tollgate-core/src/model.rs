//! Approval task data model.
//!
//! These types define the on-the-wire shape of an approval task. Field names
//! and enum string values are a stable contract: external tooling renders
//! them directly, so renames here are breaking changes.
//!
//! Enums that carry caller-supplied strings ([`VoteInput`], [`ApproverKind`])
//! keep unknown values in an `Other` variant instead of failing to decode.
//! That lets the validator report a precise, field-pathed error rather than
//! a generic decode failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::digest::ApproverDigest;

/// Annotation key under which the last aggregated approver digest is stored.
pub const LAST_APPLIED_HASH_KEY: &str = "tekton.dev/last-applied-hash";

/// Prefix reserved for group references in flat approver lists.
pub const GROUP_PREFIX: &str = "group:";

/// A single approver's decision value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VoteInput {
    /// No decision yet.
    #[default]
    Pending,
    /// Approve the task.
    Approve,
    /// Reject the task.
    Reject,
    /// Any value outside the supported set. Never valid in a persisted spec.
    Other(String),
}

impl VoteInput {
    /// Wire representation of this value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Other(raw) => raw,
        }
    }

    /// Parse a wire value. Unknown strings map to [`VoteInput::Other`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "approve" => Self::Approve,
            "reject" => Self::Reject,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether this is one of the three supported values.
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Whether this value records a decision (approve or reject).
    #[must_use]
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Approve | Self::Reject)
    }

    /// The response a decided input maps to in the aggregated status.
    #[must_use]
    pub fn response(&self) -> Option<ApprovalState> {
        match self {
            Self::Approve => Some(ApprovalState::Approved),
            Self::Reject => Some(ApprovalState::Rejected),
            Self::Pending | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for VoteInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for VoteInput {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl Serialize for VoteInput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VoteInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Whether an approver entry names a single user or a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApproverKind {
    /// An individual principal.
    #[default]
    User,
    /// A named group whose members may vote.
    Group,
    /// An unsupported kind, reported by the validator.
    Other(String),
}

impl ApproverKind {
    /// Wire representation of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
            Self::Other(raw) => raw,
        }
    }

    /// Parse a wire value. An empty string defaults to [`ApproverKind::User`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "User" | "" => Self::User,
            "Group" => Self::Group,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ApproverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ApproverKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ApproverKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// An individually tracked vote inside a group entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVote {
    /// Principal name.
    pub name: String,
    /// The principal's decision.
    #[serde(default)]
    pub input: VoteInput,
}

impl UserVote {
    /// Create a member vote.
    #[must_use]
    pub fn new(name: impl Into<String>, input: VoteInput) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

/// One named participant permitted to vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverEntry {
    /// User or group name.
    pub name: String,
    /// Entry kind.
    #[serde(rename = "type", default)]
    pub kind: ApproverKind,
    /// Entry-level decision.
    #[serde(default)]
    pub input: VoteInput,
    /// Optional free-form message attached to the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Member votes, only meaningful for [`ApproverKind::Group`].
    #[serde(
        rename = "users",
        alias = "members",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub members: Vec<UserVote>,
}

impl ApproverEntry {
    /// A pending user entry.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ApproverKind::User,
            input: VoteInput::Pending,
            message: None,
            members: Vec::new(),
        }
    }

    /// A pending group entry with no member votes.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: ApproverKind::Group,
            ..Self::user(name)
        }
    }

    /// Set the entry-level input.
    #[must_use]
    pub fn with_input(mut self, input: VoteInput) -> Self {
        self.input = input;
        self
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Add a member vote.
    #[must_use]
    pub fn with_member(mut self, name: impl Into<String>, input: VoteInput) -> Self {
        self.members.push(UserVote::new(name, input));
        self
    }

    /// Whether this entry is a group.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == ApproverKind::Group
    }

    /// Find a member vote by principal name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&UserVote> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Whether the entry or any of its members holds a decision.
    #[must_use]
    pub fn has_decision(&self) -> bool {
        self.input.is_decided() || self.members.iter().any(|m| m.input.is_decided())
    }
}

/// Desired state of an approval task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSpec {
    /// Participants permitted to vote.
    #[serde(default)]
    pub approvers: Vec<ApproverEntry>,
    /// Number of distinct approving principals needed.
    #[serde(rename = "numberOfApprovalsRequired", default)]
    pub required_approvals: i64,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApprovalSpec {
    /// Create a spec from approvers and a required count.
    #[must_use]
    pub fn new(approvers: Vec<ApproverEntry>, required_approvals: i64) -> Self {
        Self {
            approvers,
            required_approvals,
            description: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Find the entry with the given kind and name.
    #[must_use]
    pub fn entry(&self, kind: &ApproverKind, name: &str) -> Option<&ApproverEntry> {
        self.approvers
            .iter()
            .find(|e| &e.kind == kind && e.name == name)
    }

    /// Mutable access to the entry with the given kind and name.
    pub fn entry_mut(&mut self, kind: &ApproverKind, name: &str) -> Option<&mut ApproverEntry> {
        self.approvers
            .iter_mut()
            .find(|e| &e.kind == kind && e.name == name)
    }
}

/// Aggregated state of an approval task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalState {
    /// Awaiting decisions.
    #[default]
    Pending,
    /// Threshold met with no rejection.
    Approved,
    /// Rejected by a vote or by timeout.
    Rejected,
}

impl ApprovalState {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

/// A group member's decision as rolled up in the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberState {
    /// Principal name.
    pub name: String,
    /// The member's response.
    pub response: ApprovalState,
    /// Message inherited from the group entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A decided approver entry as recorded in the status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEntry {
    /// User or group name.
    pub name: String,
    /// Entry kind.
    #[serde(rename = "type", default)]
    pub kind: ApproverKind,
    /// The entry's overall response.
    pub response: ApprovalState,
    /// Message from the spec entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Decided member votes, for groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_members: Vec<GroupMemberState>,
}

/// Derived status of an approval task. Written only by aggregation and
/// timeout handling, never by a voting principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStatus {
    /// Overall state.
    #[serde(default)]
    pub state: ApprovalState,
    /// Names of every listed approver.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approvers: Vec<String>,
    /// Decided entries.
    #[serde(rename = "approversResponse", default)]
    pub entries: Vec<AggregatedEntry>,
    /// Copy of the required approval count.
    #[serde(rename = "approvalsRequired", default)]
    pub required: i64,
    /// Number of distinct approving principals.
    #[serde(rename = "approvalsReceived", default)]
    pub received: i64,
    /// When the task started waiting for decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Why the task reached its state, when not from votes alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalStatus {
    /// Initial status for a freshly created task.
    #[must_use]
    pub fn initial(spec: &ApprovalSpec) -> Self {
        Self {
            state: ApprovalState::Pending,
            approvers: approver_names(spec),
            entries: Vec::new(),
            required: spec.required_approvals,
            received: 0,
            start_time: None,
            reason: None,
        }
    }
}

/// Sorted, de-duplicated approver names for the status `approvers` list.
pub(crate) fn approver_names(spec: &ApprovalSpec) -> Vec<String> {
    let mut names: Vec<String> = spec.approvers.iter().map(|e| e.name.clone()).collect();
    names.sort();
    names.dedup();
    names
}

/// An authenticated identity attempting to act on a task.
///
/// Group memberships are resolved by the caller; this crate never looks
/// them up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user name.
    pub username: String,
    /// Groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    /// Create a principal with no group memberships.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: Vec::new(),
        }
    }

    /// Add a group membership.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Whether the principal claims membership of `group`.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Object metadata carried by a stored task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Task name.
    #[serde(default)]
    pub name: String,
    /// Optional namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Optimistic-concurrency version, bumped by the store on every write.
    #[serde(default)]
    pub resource_version: u64,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// When the task was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Create metadata for a named object.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Store key: `namespace/name`, or just `name` without a namespace.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A stored approval task resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTask {
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default)]
    pub spec: ApprovalSpec,
    /// Derived state.
    #[serde(default)]
    pub status: ApprovalStatus,
}

impl ApprovalTask {
    /// Create a task with default metadata and status.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: ApprovalSpec) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            status: ApprovalStatus::initial(&spec),
            spec,
        }
    }

    /// Store key for this task.
    #[must_use]
    pub fn key(&self) -> String {
        self.metadata.key()
    }

    /// The digest recorded by the last aggregation, if any and well-formed.
    #[must_use]
    pub fn last_applied_digest(&self) -> Option<ApproverDigest> {
        self.metadata
            .annotations
            .get(LAST_APPLIED_HASH_KEY)
            .and_then(|raw| ApproverDigest::from_hex(raw).ok())
    }

    /// Record `digest` as the last aggregated approver digest.
    pub fn set_last_applied_digest(&mut self, digest: ApproverDigest) {
        self.metadata
            .annotations
            .insert(LAST_APPLIED_HASH_KEY.to_owned(), digest.to_hex());
    }
}
