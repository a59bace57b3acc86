//! Vote aggregation.
//!
//! [`aggregate`] is a pure function of the spec and the previous status. It
//! never reads the clock and never regresses a terminal status.

use std::collections::BTreeSet;

use tracing::trace;

use crate::model::{
    AggregatedEntry, ApprovalSpec, ApprovalState, ApprovalStatus, ApproverEntry, ApproverKind,
    GroupMemberState, VoteInput, approver_names,
};

/// The raw vote count behind an aggregated status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Distinct principals with an approving vote.
    pub approving: BTreeSet<String>,
    /// Whether any entry or member rejected.
    pub has_rejection: bool,
}

impl Tally {
    /// Number of distinct approving principals.
    #[must_use]
    pub fn received(&self) -> i64 {
        i64::try_from(self.approving.len()).unwrap_or(i64::MAX)
    }

    /// Whether the approvals satisfy `required`. A non-positive requirement is
    /// never satisfied.
    #[must_use]
    pub fn meets(&self, required: i64) -> bool {
        required > 0 && self.received() >= required
    }

    /// The state these votes produce under `required`.
    #[must_use]
    pub fn state(&self, required: i64) -> ApprovalState {
        if self.has_rejection {
            ApprovalState::Rejected
        } else if self.meets(required) {
            ApprovalState::Approved
        } else {
            ApprovalState::Pending
        }
    }
}

/// Count the votes in `spec`.
///
/// Direct user approvals and group member approvals are merged by principal
/// name, so a user who approves both directly and as a group member counts
/// once. A group-level approve without member detail names no principal and
/// adds nothing to the count.
#[must_use]
pub fn tally(spec: &ApprovalSpec) -> Tally {
    let mut tally = Tally::default();
    for entry in &spec.approvers {
        if entry.input == VoteInput::Reject {
            tally.has_rejection = true;
        }
        if entry.kind == ApproverKind::User && entry.input == VoteInput::Approve {
            tally.approving.insert(entry.name.clone());
        }
        if entry.kind == ApproverKind::Group {
            for member in &entry.members {
                match member.input {
                    VoteInput::Approve => {
                        tally.approving.insert(member.name.clone());
                    },
                    VoteInput::Reject => tally.has_rejection = true,
                    VoteInput::Pending | VoteInput::Other(_) => {},
                }
            }
        }
    }
    tally
}

/// Aggregate the votes in `spec` into a status.
///
/// If `previous` is terminal it is returned unchanged. Otherwise the result
/// carries `previous`'s start time and is independent of approver order.
#[must_use]
pub fn aggregate(spec: &ApprovalSpec, previous: Option<&ApprovalStatus>) -> ApprovalStatus {
    if let Some(prev) = previous.filter(|p| p.state.is_terminal()) {
        trace!(state = %prev.state, "status is terminal, skipping aggregation");
        return prev.clone();
    }

    let tally = tally(spec);
    let state = tally.state(spec.required_approvals);

    let mut entries: Vec<AggregatedEntry> = spec
        .approvers
        .iter()
        .filter(|e| e.has_decision())
        .map(aggregate_entry)
        .collect();
    entries.sort_by(|a, b| {
        (&a.kind, &a.name, &a.message).cmp(&(&b.kind, &b.name, &b.message))
    });

    ApprovalStatus {
        state,
        approvers: approver_names(spec),
        entries,
        required: spec.required_approvals,
        received: tally.received(),
        start_time: previous.and_then(|p| p.start_time),
        reason: None,
    }
}

fn aggregate_entry(entry: &ApproverEntry) -> AggregatedEntry {
    let mut group_members: Vec<GroupMemberState> = entry
        .members
        .iter()
        .filter_map(|m| {
            m.input.response().map(|response| GroupMemberState {
                name: m.name.clone(),
                response,
                message: entry.message.clone(),
            })
        })
        .collect();
    group_members.sort_by(|a, b| a.name.cmp(&b.name));

    let rejected = entry.input == VoteInput::Reject
        || group_members
            .iter()
            .any(|m| m.response == ApprovalState::Rejected);
    let response = if rejected {
        ApprovalState::Rejected
    } else {
        ApprovalState::Approved
    };

    AggregatedEntry {
        name: entry.name.clone(),
        kind: entry.kind.clone(),
        response,
        message: entry.message.clone(),
        group_members,
    }
}
