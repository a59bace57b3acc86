//! Authorization of proposed approver list edits.
//!
//! [`authorize`] admits an edit only if it is a narrowly scoped vote by the
//! acting principal on their own slot. The check is all-or-nothing: one
//! foreign change anywhere in the diff denies the whole edit, even when the
//! principal's own change is valid.
//!
//! A principal's own slots are:
//!
//! - the `input` and `message` of the `User` entry carrying their name;
//! - the `input` of a group they belong to, when the group tracks no
//!   members yet, or when the edit sets their own member record to the same
//!   value;
//! - their own record in a group's member list, including adding it for the
//!   first time to a group they belong to.
//!
//! A group's `message` counts as the principal's only when the same edit
//! carries their vote in that group. Everything else (other entries, other
//! members, removals, added or removed entries, the required count and the
//! description) is foreign.
//!
//! One edit holds at most one vote. Setting a group's `input` together with
//! the principal's own record in that group, to the same value, is one vote;
//! votes in two slots, or two different values, are refused.
//!
//! A direct group vote (group `input` decided, no member records) is on
//! record for every member of that group: after a group-level reject none of
//! them may edit, and after a group-level approve none may approve again.

mod diff;

use tracing::debug;

use crate::aggregate::tally;
use crate::model::{ApprovalSpec, ApprovalState, ApprovalTask, ApproverKind, Principal, VoteInput};
use diff::{Change, diff};

/// Denial reason once the task is terminal or already has enough approvals.
pub const FINAL_STATE: &str = "ApprovalTask has already reached its final state";
/// Denial reason for principals with no slot in the approver list.
pub const NOT_AN_APPROVER: &str = "User is not present in the approvers list";
/// Denial reason for edits touching anything but the principal's own slots.
pub const ONLY_OWN_INPUT: &str = "User can only update their own approval input";
/// Denial reason for a repeated approval.
pub const ALREADY_APPROVED: &str = "User has already approved";
/// Denial reason for any edit after the principal rejected.
pub const ALREADY_REJECTED: &str = "User has already rejected";

/// The outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The edit may be persisted.
    Allow,
    /// The edit must be refused; `reason` is shown to the principal verbatim.
    Deny {
        /// Human-readable denial reason.
        reason: String,
    },
}

impl Decision {
    fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Whether the edit is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The denial reason, if denied.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason } => Some(reason),
        }
    }
}

/// Decide whether `principal` may replace `old.spec` with `new`.
///
/// `old` must be the stored task the edit was based on. When a
/// compare-and-swap on the write fails, call this again with the freshly read
/// task rather than reusing the earlier decision.
#[must_use]
pub fn authorize(old: &ApprovalTask, new: &ApprovalSpec, principal: &Principal) -> Decision {
    let decision = evaluate(old, new, principal);
    match &decision {
        Decision::Allow => debug!(
            task = %old.metadata.name,
            principal = %principal,
            "approval edit allowed"
        ),
        Decision::Deny { reason } => debug!(
            task = %old.metadata.name,
            principal = %principal,
            reason = %reason,
            "approval edit denied"
        ),
    }
    decision
}

fn evaluate(old: &ApprovalTask, new: &ApprovalSpec, principal: &Principal) -> Decision {
    let spec = &old.spec;

    if old.status.state.is_terminal() || tally(spec).meets(spec.required_approvals) {
        return Decision::deny(FINAL_STATE);
    }

    if !is_eligible(spec, principal) {
        return Decision::deny(NOT_AN_APPROVER);
    }

    let changes = diff(spec, new);
    let mut votes: Vec<(Slot<'_>, &VoteInput)> = Vec::new();
    let mut group_messages: Vec<&str> = Vec::new();
    let mut own_changes = 0usize;
    let mut foreign_changes = 0usize;
    for change in &changes {
        if let Change::Message {
            kind: ApproverKind::Group,
            name,
        } = *change
            && belongs_to(spec, name, principal)
        {
            group_messages.push(name);
        } else if is_own(change, spec, new, principal) {
            own_changes = own_changes.saturating_add(1);
            votes.extend(vote_slot(change));
        } else {
            foreign_changes = foreign_changes.saturating_add(1);
        }
    }

    // A group message is only the principal's when it rides along with their
    // vote in that group.
    for group in group_messages {
        if votes.iter().any(|(slot, _)| *slot == Slot::Group(group)) {
            own_changes = own_changes.saturating_add(1);
        } else {
            foreign_changes = foreign_changes.saturating_add(1);
        }
    }

    if let Some((_, bad)) = votes.iter().find(|(_, v)| !v.is_decided()) {
        return Decision::deny(format!(
            "Invalid input change: invalid input value: '{bad}'. Supported values are 'approve' or 'reject'"
        ));
    }

    let recorded = recorded_responses(old, principal);
    if recorded.contains(&ApprovalState::Rejected) {
        return Decision::deny(ALREADY_REJECTED);
    }
    if recorded.contains(&ApprovalState::Approved)
        && votes.iter().any(|(_, v)| **v == VoteInput::Approve)
    {
        return Decision::deny(ALREADY_APPROVED);
    }

    if own_changes == 0 || foreign_changes > 0 || !is_single_vote(&votes) {
        return Decision::deny(ONLY_OWN_INPUT);
    }

    Decision::Allow
}

/// An open task (no approvers) admits anyone; otherwise the principal needs a
/// user entry, a group claim, or an explicit member record.
fn is_eligible(spec: &ApprovalSpec, principal: &Principal) -> bool {
    spec.approvers.is_empty()
        || spec.approvers.iter().any(|entry| match entry.kind {
            ApproverKind::User => entry.name == principal.username,
            ApproverKind::Group => belongs_to(spec, &entry.name, principal),
            ApproverKind::Other(_) => false,
        })
}

fn belongs_to(spec: &ApprovalSpec, group: &str, principal: &Principal) -> bool {
    principal.in_group(group)
        || spec
            .entry(&ApproverKind::Group, group)
            .is_some_and(|e| e.member(&principal.username).is_some())
}

fn is_own(change: &Change<'_>, old: &ApprovalSpec, new: &ApprovalSpec, principal: &Principal) -> bool {
    let me = principal.username.as_str();
    match *change {
        Change::Input {
            kind: ApproverKind::User,
            name,
            ..
        }
        | Change::Message {
            kind: ApproverKind::User,
            name,
        } => name == me,
        Change::Input {
            kind: ApproverKind::Group,
            name,
            new: value,
        } => belongs_to(old, name, principal) && direct_or_paired_group_vote(old, new, name, me, value),
        Change::MemberAdded { group, member, .. } => member == me && belongs_to(old, group, principal),
        Change::MemberInput { member, .. } => member == me,
        Change::Input { .. }
        | Change::Message { .. }
        | Change::MemberRemoved { .. }
        | Change::EntryAdded { .. }
        | Change::EntryRemoved { .. }
        | Change::RequiredApprovals
        | Change::Description => false,
    }
}

/// A group-level input belongs to the principal when the group has no member
/// records (a direct group vote), or when the same edit moves the principal's
/// own member record to that value.
fn direct_or_paired_group_vote(
    old: &ApprovalSpec,
    new: &ApprovalSpec,
    group: &str,
    me: &str,
    value: &VoteInput,
) -> bool {
    let Some(old_group) = old.entry(&ApproverKind::Group, group) else {
        return false;
    };
    if old_group.members.is_empty() {
        return true;
    }
    let old_vote = old_group.member(me).map(|m| &m.input);
    let new_vote = new
        .entry(&ApproverKind::Group, group)
        .and_then(|e| e.member(me))
        .map(|m| &m.input);
    new_vote == Some(value) && old_vote != Some(value)
}

/// Where an own vote lands. A group-level input and the principal's member
/// record in the same group are one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot<'a> {
    User,
    Group(&'a str),
}

fn vote_slot<'a>(change: &Change<'a>) -> Option<(Slot<'a>, &'a VoteInput)> {
    match *change {
        Change::Input {
            kind: ApproverKind::User,
            new,
            ..
        } => Some((Slot::User, new)),
        Change::Input {
            kind: ApproverKind::Group,
            name,
            new,
        } => Some((Slot::Group(name), new)),
        Change::MemberAdded { group, input, .. } => Some((Slot::Group(group), input)),
        Change::MemberInput { group, new, .. } => Some((Slot::Group(group), new)),
        _ => None,
    }
}

/// At most one slot, holding one value.
fn is_single_vote(votes: &[(Slot<'_>, &VoteInput)]) -> bool {
    match votes.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|vote| vote == first),
    }
}

/// Every decision already on record for `principal`, from the stored spec
/// and from the stored status.
fn recorded_responses(old: &ApprovalTask, principal: &Principal) -> Vec<ApprovalState> {
    let me = principal.username.as_str();
    let mut recorded = Vec::new();

    for entry in &old.spec.approvers {
        match entry.kind {
            ApproverKind::User if entry.name == me => recorded.extend(entry.input.response()),
            // A direct group vote is the decision of every member.
            ApproverKind::Group if entry.members.is_empty() => {
                if principal.in_group(&entry.name) {
                    recorded.extend(entry.input.response());
                }
            },
            ApproverKind::Group => recorded.extend(
                entry
                    .members
                    .iter()
                    .filter(|m| m.name == me)
                    .filter_map(|m| m.input.response()),
            ),
            _ => {},
        }
    }

    for entry in &old.status.entries {
        match entry.kind {
            ApproverKind::User if entry.name == me => recorded.push(entry.response),
            ApproverKind::Group if entry.group_members.is_empty() => {
                if principal.in_group(&entry.name) {
                    recorded.push(entry.response);
                }
            },
            ApproverKind::Group => recorded.extend(
                entry
                    .group_members
                    .iter()
                    .filter(|m| m.name == me)
                    .map(|m| m.response),
            ),
            _ => {},
        }
    }

    recorded
}
