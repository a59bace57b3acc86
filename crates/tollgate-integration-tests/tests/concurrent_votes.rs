//! Votes racing each other through the compare-and-swap store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;

use tollgate_controller::error::StoreResult;
use tollgate_controller::{MemoryStore, ResourceStore, VoteClient};
use tollgate_core::{ApprovalState, ApprovalTask, Principal, VoteInput};
use tollgate_test::prelude::*;

/// Lands a vote from another principal right before the first update goes
/// through, so the update is based on a stale version.
struct Interleaving {
    inner: Arc<MemoryStore>,
    interloper: Mutex<Option<Principal>>,
}

#[async_trait]
impl ResourceStore for Interleaving {
    async fn get(&self, key: &str) -> StoreResult<ApprovalTask> {
        self.inner.get(key).await
    }

    async fn create(&self, task: ApprovalTask) -> StoreResult<ApprovalTask> {
        self.inner.create(task).await
    }

    async fn update(&self, task: ApprovalTask) -> StoreResult<ApprovalTask> {
        let interloper = self.interloper.lock().unwrap().take();
        if let Some(principal) = interloper {
            VoteClient::new(Arc::clone(&self.inner))
                .vote(&task.key(), &principal, VoteInput::Approve, None)
                .await
                .unwrap();
        }
        self.inner.update(task).await
    }

    async fn update_status(&self, task: ApprovalTask) -> StoreResult<ApprovalTask> {
        self.inner.update_status(task).await
    }

    async fn list(&self) -> StoreResult<Vec<ApprovalTask>> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn test_lost_race_is_retried_on_fresh_state() {
    let gate = Gate::new(
        TaskBuilder::new("deploy-gate")
            .user("alice")
            .user("bob")
            .required(2)
            .build(),
    )
    .await;
    let racing = Arc::new(Interleaving {
        inner: Arc::clone(&gate.store),
        interloper: Mutex::new(Some(user("bob"))),
    });

    let task = VoteClient::new(racing)
        .vote(&gate.key, &user("alice"), VoteInput::Approve, None)
        .await
        .unwrap();

    // bob's vote landed first and survived alice's retry.
    assert_eq!(task.metadata.resource_version, 3);
    assert!(
        task.spec
            .approvers
            .iter()
            .all(|entry| entry.input == VoteInput::Approve)
    );
    assert_eq!(gate.reconcile().await.state, ApprovalState::Approved);
}

#[tokio::test]
async fn test_no_retries_surfaces_exhaustion() {
    let gate = Gate::new(
        TaskBuilder::new("deploy-gate")
            .user("alice")
            .user("bob")
            .required(2)
            .build(),
    )
    .await;
    let racing = Arc::new(Interleaving {
        inner: Arc::clone(&gate.store),
        interloper: Mutex::new(Some(user("bob"))),
    });

    let err = VoteClient::new(racing)
        .with_max_retries(0)
        .vote(&gate.key, &user("alice"), VoteInput::Approve, None)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            tollgate_controller::ControllerError::RetriesExhausted { attempts: 1, .. }
        ),
        "{err}"
    );

    // Only bob's vote was stored.
    let task = gate.task().await;
    assert_eq!(task.spec.approvers[0].input, VoteInput::Pending);
    assert_eq!(task.spec.approvers[1].input, VoteInput::Approve);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_voters_all_land() {
    let names = ["alice", "bob", "carol", "dave", "erin"];
    let mut builder = TaskBuilder::new("deploy-gate").required(5);
    for name in names {
        builder = builder.user(name);
    }
    let gate = Gate::new(builder.build()).await;

    let client = Arc::new(VoteClient::new(Arc::clone(&gate.store)).with_max_retries(4));
    let handles = names.map(|name| {
        let client = Arc::clone(&client);
        let key = gate.key.clone();
        tokio::spawn(async move {
            client
                .vote(&key, &user(name), VoteInput::Approve, None)
                .await
        })
    });

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let outcome = gate.reconcile().await;
    assert_eq!(outcome.state, ApprovalState::Approved);
    assert_eq!(gate.task().await.status.received, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_group_members_all_land() {
    let gate = Gate::new(
        TaskBuilder::new("deploy-gate")
            .group("qa", &[])
            .required(3)
            .build(),
    )
    .await;

    let client = Arc::new(VoteClient::new(Arc::clone(&gate.store)).with_max_retries(2));
    let voters = ["dave", "erin", "frank"].map(|name| {
        let client = Arc::clone(&client);
        let key = gate.key.clone();
        async move {
            client
                .vote(&key, &member_of(name, &["qa"]), VoteInput::Approve, None)
                .await
        }
    });

    for result in join_all(voters).await {
        result.unwrap();
    }

    let task = gate.task().await;
    assert_eq!(task.spec.approvers[0].members.len(), 3);
    assert_eq!(gate.reconcile().await.state, ApprovalState::Approved);
}
