//! Drives stored tasks towards their aggregated outcome.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use tollgate_core::{
    ApprovalState, DEFAULT_TIMEOUT, aggregate, digest, has_timed_out, remaining, timeout_reason,
};
use tollgate_telemetry::RequestContext;

use crate::clock::Clock;
use crate::error::ControllerResult;
use crate::store::ResourceStore;

/// Result of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// State after the pass.
    pub state: ApprovalState,
    /// When to check again; `None` once the task is terminal or has no
    /// deadline.
    pub requeue_after: Option<Duration>,
    /// Whether the pass wrote to the store.
    pub updated: bool,
}

/// Recomputes task status when the approver list changes and enforces the
/// timeout.
///
/// A pass is idempotent: running it again without an intervening spec
/// change performs no write.
#[derive(Debug)]
pub struct Reconciler<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl<S: ResourceStore + ?Sized> Reconciler<S> {
    /// Create a reconciler with the default one-hour timeout.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the timeout. Zero disables it.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one pass over the task stored under `key`.
    ///
    /// The approver list is aggregated first; the timeout only applies to a
    /// task that is still pending afterwards, so votes that reached the
    /// threshold before a late pass are never lost.
    ///
    /// # Errors
    ///
    /// Returns a store error if the task is missing or the status write
    /// conflicts with a concurrent write. Conflicts are safe to retry.
    pub async fn reconcile(&self, key: &str) -> ControllerResult<ReconcileOutcome> {
        RequestContext::new("reconciler")
            .with_operation("reconcile")
            .with_task(key)
            .scope(self.pass(key))
            .await
    }

    async fn pass(&self, key: &str) -> ControllerResult<ReconcileOutcome> {
        let mut task = self.store.get(key).await?;
        let now = self.clock.now();
        let mut dirty = false;

        let start = match task.status.start_time {
            Some(start) => start,
            None => {
                let start = task.metadata.creation_timestamp.unwrap_or(now);
                debug!(%start, "Starting approval task");
                task.status.start_time = Some(start);
                dirty = true;
                start
            },
        };

        if task.status.state.is_terminal() {
            debug!(state = %task.status.state, "Approval task is done");
            if dirty {
                self.store.update_status(task.clone()).await?;
            }
            return Ok(ReconcileOutcome {
                state: task.status.state,
                requeue_after: None,
                updated: dirty,
            });
        }

        let current = digest(&task.spec.approvers);
        if task.last_applied_digest() == Some(current) {
            debug!(digest = ?current, "Approver list unchanged");
        } else {
            let previous = task.status.state;
            task.status = aggregate(&task.spec, Some(&task.status));
            task.set_last_applied_digest(current);
            dirty = true;
            log_transition(previous, &task.status);
        }

        if task.status.state == ApprovalState::Pending && has_timed_out(start, now, self.timeout) {
            let reason = timeout_reason(&task.metadata.name);
            warn!(%reason, "Approval task timed out");
            task.status.state = ApprovalState::Rejected;
            task.status.reason = Some(reason);
            dirty = true;
        }

        if dirty {
            task = self.store.update_status(task).await?;
        }

        let state = task.status.state;
        let requeue_after = if state.is_terminal() {
            None
        } else {
            remaining(start, now, self.timeout)
        };
        Ok(ReconcileOutcome {
            state,
            requeue_after,
            updated: dirty,
        })
    }

    /// Run one pass over every stored task, in key order.
    ///
    /// A failure on one task does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns an error only if the task list cannot be read.
    pub async fn reconcile_all(
        &self,
    ) -> ControllerResult<Vec<(String, ControllerResult<ReconcileOutcome>)>> {
        let keys: Vec<String> = self
            .store
            .list()
            .await?
            .iter()
            .map(tollgate_core::ApprovalTask::key)
            .collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let outcome = self.reconcile(&key).await;
            if let Err(e) = &outcome {
                warn!(task = %key, error = %e, "Reconcile failed");
            }
            results.push((key, outcome));
        }
        Ok(results)
    }
}

fn log_transition(previous: ApprovalState, status: &tollgate_core::ApprovalStatus) {
    match status.state {
        ApprovalState::Pending => info!(
            received = status.received,
            required = status.required,
            "Approval task is pending"
        ),
        ApprovalState::Approved => info!(
            received = status.received,
            required = status.required,
            "Approval task is approved"
        ),
        ApprovalState::Rejected => info!("Approval task is rejected"),
    }
    if previous != status.state {
        debug!(from = %previous, to = %status.state, "State changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;
    use tollgate_core::{ApprovalSpec, ApprovalTask, ApproverEntry, VoteInput};

    use crate::error::{ControllerError, StoreError};
    use crate::store::MemoryStore;

    #[derive(Debug)]
    struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        fn at(minute: u32) -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                Utc.with_ymd_and_hms(2026, 5, 4, 9, minute, 0).unwrap(),
            )))
        }

        fn set(&self, minute: u32) {
            *self.0.lock().unwrap() = Utc.with_ymd_and_hms(2026, 5, 4, 9, minute, 0).unwrap();
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn task() -> ApprovalTask {
        let mut task = ApprovalTask::new(
            "deploy-gate",
            ApprovalSpec::new(
                vec![ApproverEntry::user("alice"), ApproverEntry::user("bob")],
                2,
            ),
        );
        task.metadata.creation_timestamp =
            Some(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap());
        task
    }

    async fn setup(clock: Arc<FixedClock>) -> (Arc<MemoryStore>, Reconciler<MemoryStore>) {
        let store = MemoryStore::new().shared();
        store.create(task()).await.unwrap();
        let reconciler = Reconciler::new(Arc::clone(&store), clock)
            .with_timeout(Duration::from_secs(30 * 60));
        (store, reconciler)
    }

    async fn vote(store: &MemoryStore, index: usize, input: VoteInput) {
        let mut current = store.get("deploy-gate").await.unwrap();
        current.spec.approvers[index].input = input;
        store.update(current).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_pass_initializes_and_aggregates() {
        let (store, reconciler) = setup(FixedClock::at(10)).await;

        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Pending);
        assert!(outcome.updated);
        assert_eq!(outcome.requeue_after, Some(Duration::from_secs(20 * 60)));

        let stored = store.get("deploy-gate").await.unwrap();
        assert_eq!(stored.status.start_time, task().metadata.creation_timestamp);
        assert_eq!(
            stored.last_applied_digest(),
            Some(digest(&stored.spec.approvers))
        );
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let (store, reconciler) = setup(FixedClock::at(1)).await;
        reconciler.reconcile("deploy-gate").await.unwrap();
        let version = store.get("deploy-gate").await.unwrap().metadata.resource_version;

        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert!(!outcome.updated);
        assert_eq!(
            store.get("deploy-gate").await.unwrap().metadata.resource_version,
            version
        );
    }

    #[tokio::test]
    async fn test_votes_reach_approval() {
        let (store, reconciler) = setup(FixedClock::at(1)).await;
        reconciler.reconcile("deploy-gate").await.unwrap();

        vote(&store, 0, VoteInput::Approve).await;
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Pending);
        assert_eq!(store.get("deploy-gate").await.unwrap().status.received, 1);

        vote(&store, 1, VoteInput::Approve).await;
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Approved);
        assert_eq!(outcome.requeue_after, None);
    }

    #[tokio::test]
    async fn test_timeout_forces_rejection() {
        let clock = FixedClock::at(1);
        let (store, reconciler) = setup(Arc::clone(&clock)).await;
        reconciler.reconcile("deploy-gate").await.unwrap();

        clock.set(31);
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Rejected);
        assert_eq!(outcome.requeue_after, None);

        let stored = store.get("deploy-gate").await.unwrap();
        assert_eq!(stored.status.state, ApprovalState::Rejected);
        assert_eq!(
            stored.status.reason.as_deref(),
            Some("Approval task deploy-gate is failed because of timeout")
        );
    }

    #[tokio::test]
    async fn test_late_pass_keeps_approval_reached_in_time() {
        let clock = FixedClock::at(1);
        let (store, reconciler) = setup(Arc::clone(&clock)).await;
        vote(&store, 0, VoteInput::Approve).await;
        vote(&store, 1, VoteInput::Approve).await;

        // Both votes landed before the deadline; the pass runs after it.
        clock.set(45);
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Approved);
        assert_eq!(outcome.requeue_after, None);

        let stored = store.get("deploy-gate").await.unwrap();
        assert_eq!(stored.status.state, ApprovalState::Approved);
        assert_eq!(stored.status.reason, None);
    }

    #[tokio::test]
    async fn test_late_pass_with_partial_votes_times_out() {
        let clock = FixedClock::at(1);
        let (store, reconciler) = setup(Arc::clone(&clock)).await;
        vote(&store, 0, VoteInput::Approve).await;

        clock.set(45);
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Rejected);

        // The aggregated tally is kept alongside the timeout.
        let stored = store.get("deploy-gate").await.unwrap();
        assert_eq!(stored.status.received, 1);
        assert_eq!(
            stored.last_applied_digest(),
            Some(digest(&stored.spec.approvers))
        );
        assert!(stored.status.reason.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reconcile_can_be_spawned() {
        let (_store, reconciler) = setup(FixedClock::at(1)).await;
        let reconciler = Arc::new(reconciler);
        let handle = tokio::spawn({
            let reconciler = Arc::clone(&reconciler);
            async move { reconciler.reconcile("deploy-gate").await }
        });
        assert_eq!(
            handle.await.unwrap().unwrap().state,
            ApprovalState::Pending
        );
    }

    #[tokio::test]
    async fn test_terminal_task_left_alone() {
        let clock = FixedClock::at(1);
        let (store, reconciler) = setup(Arc::clone(&clock)).await;
        vote(&store, 0, VoteInput::Reject).await;
        assert_eq!(
            reconciler.reconcile("deploy-gate").await.unwrap().state,
            ApprovalState::Rejected
        );

        clock.set(59);
        vote(&store, 0, VoteInput::Approve).await;
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Rejected);
        assert!(!outcome.updated);
        assert_eq!(
            store.get("deploy-gate").await.unwrap().status.reason,
            None
        );
    }

    #[tokio::test]
    async fn test_zero_timeout_never_requeues() {
        let (_store, reconciler) = setup(FixedClock::at(59)).await;
        let reconciler = reconciler.with_timeout(Duration::ZERO);
        let outcome = reconciler.reconcile("deploy-gate").await.unwrap();
        assert_eq!(outcome.state, ApprovalState::Pending);
        assert_eq!(outcome.requeue_after, None);
    }

    #[tokio::test]
    async fn test_missing_task() {
        let (_store, reconciler) = setup(FixedClock::at(1)).await;
        let err = reconciler.reconcile("other").await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Store(StoreError::NotFound(ref key)) if key == "other"
        ));
    }

    #[tokio::test]
    async fn test_reconcile_all() {
        let (store, reconciler) = setup(FixedClock::at(1)).await;
        let mut second = task();
        second.metadata.name = "another-gate".to_string();
        store.create(second).await.unwrap();

        let results = reconciler.reconcile_all().await.unwrap();
        let keys: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["another-gate", "deploy-gate"]);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }
}
