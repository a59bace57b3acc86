//! Field-scoped diff of two approval specs.
//!
//! Only fields that matter to authorization are compared. Entries are keyed
//! by `(kind, name)` and members by name, so reordering is never a change.

use std::collections::BTreeMap;

use crate::model::{ApprovalSpec, ApproverEntry, ApproverKind, UserVote, VoteInput};

/// One field-level difference between an old and a new spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Change<'a> {
    /// An entry present in the new spec only, or a duplicate key in it.
    EntryAdded {
        kind: &'a ApproverKind,
        name: &'a str,
    },
    /// An entry present in the old spec only.
    EntryRemoved {
        kind: &'a ApproverKind,
        name: &'a str,
    },
    /// The entry-level input changed.
    Input {
        kind: &'a ApproverKind,
        name: &'a str,
        new: &'a VoteInput,
    },
    /// The entry message changed.
    Message {
        kind: &'a ApproverKind,
        name: &'a str,
    },
    /// A member record appeared in a group.
    MemberAdded {
        group: &'a str,
        member: &'a str,
        input: &'a VoteInput,
    },
    /// A member record disappeared from a group.
    MemberRemoved { group: &'a str, member: &'a str },
    /// A member's input changed.
    MemberInput {
        group: &'a str,
        member: &'a str,
        new: &'a VoteInput,
    },
    /// `numberOfApprovalsRequired` changed.
    RequiredApprovals,
    /// `description` changed.
    Description,
}

type EntryKey<'a> = (&'a ApproverKind, &'a str);

/// Every authorization-relevant difference between `old` and `new`.
pub(crate) fn diff<'a>(old: &'a ApprovalSpec, new: &'a ApprovalSpec) -> Vec<Change<'a>> {
    let mut changes = Vec::new();

    if old.required_approvals != new.required_approvals {
        changes.push(Change::RequiredApprovals);
    }
    if old.description != new.description {
        changes.push(Change::Description);
    }

    let old_entries = index_entries(&old.approvers, &mut |kind, name| {
        changes.push(Change::EntryRemoved { kind, name });
    });
    let new_entries = index_entries(&new.approvers, &mut |kind, name| {
        changes.push(Change::EntryAdded { kind, name });
    });

    for key in old_entries.keys() {
        if !new_entries.contains_key(key) {
            changes.push(Change::EntryRemoved {
                kind: key.0,
                name: key.1,
            });
        }
    }

    for (key, &new_entry) in &new_entries {
        match old_entries.get(key) {
            Some(&old_entry) => diff_entry(old_entry, new_entry, &mut changes),
            None => changes.push(Change::EntryAdded {
                kind: key.0,
                name: key.1,
            }),
        }
    }

    changes
}

fn index_entries<'a>(
    entries: &'a [ApproverEntry],
    on_duplicate: &mut dyn FnMut(&'a ApproverKind, &'a str),
) -> BTreeMap<EntryKey<'a>, &'a ApproverEntry> {
    let mut index = BTreeMap::new();
    for entry in entries {
        let key = (&entry.kind, entry.name.as_str());
        if index.contains_key(&key) {
            on_duplicate(key.0, key.1);
        } else {
            index.insert(key, entry);
        }
    }
    index
}

fn diff_entry<'a>(old: &'a ApproverEntry, new: &'a ApproverEntry, changes: &mut Vec<Change<'a>>) {
    if old.input != new.input {
        changes.push(Change::Input {
            kind: &new.kind,
            name: &new.name,
            new: &new.input,
        });
    }
    if old.message != new.message {
        changes.push(Change::Message {
            kind: &new.kind,
            name: &new.name,
        });
    }

    let group = new.name.as_str();
    let old_members = index_members(&old.members, &mut |member, _| {
        changes.push(Change::MemberRemoved { group, member });
    });
    let new_members = index_members(&new.members, &mut |member, input| {
        changes.push(Change::MemberAdded {
            group,
            member,
            input,
        });
    });

    for &member in old_members.keys() {
        if !new_members.contains_key(member) {
            changes.push(Change::MemberRemoved { group, member });
        }
    }
    for (&member, &vote) in &new_members {
        match old_members.get(member) {
            Some(old_vote) if old_vote.input != vote.input => {
                changes.push(Change::MemberInput {
                    group,
                    member,
                    new: &vote.input,
                });
            },
            Some(_) => {},
            None => changes.push(Change::MemberAdded {
                group,
                member,
                input: &vote.input,
            }),
        }
    }
}

fn index_members<'a>(
    members: &'a [UserVote],
    on_duplicate: &mut dyn FnMut(&'a str, &'a VoteInput),
) -> BTreeMap<&'a str, &'a UserVote> {
    let mut index = BTreeMap::new();
    for vote in members {
        if index.contains_key(vote.name.as_str()) {
            on_duplicate(vote.name.as_str(), &vote.input);
        } else {
            index.insert(vote.name.as_str(), vote);
        }
    }
    index
}
