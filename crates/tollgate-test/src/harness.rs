//! An in-memory gate wired end to end.

use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use tollgate_controller::{
    ControllerResult, MemoryStore, ReconcileOutcome, Reconciler, ResourceStore, VoteClient,
};
use tollgate_core::{ApprovalTask, Principal, VoteInput};

use crate::clock::ManualClock;

/// Set up test logging with the given filter.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Write `content` to a temporary `.toml` file.
///
/// # Panics
///
/// Panics if the file cannot be created or written.
#[must_use]
pub fn test_config_file(content: &str) -> NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

/// A store, a manual clock, a reconciler and a vote client sharing one
/// task.
#[derive(Debug)]
pub struct Gate {
    /// Key of the task under test.
    pub key: String,
    /// Backing store.
    pub store: Arc<MemoryStore>,
    /// Clock driving the reconciler.
    pub clock: Arc<ManualClock>,
    /// Reconciler over `store`.
    pub reconciler: Reconciler<MemoryStore>,
    /// Vote client over `store`.
    pub client: VoteClient<MemoryStore>,
}

impl Gate {
    /// Store `task` and wire everything up with a one-hour timeout. The
    /// clock starts at the task's creation time.
    ///
    /// # Panics
    ///
    /// Panics if the task cannot be stored.
    pub async fn new(task: ApprovalTask) -> Self {
        let key = task.key();
        let clock = Arc::new(match task.metadata.creation_timestamp {
            Some(at) => ManualClock::new(at),
            None => ManualClock::at_epoch(),
        });
        let store = MemoryStore::new().shared();
        store.create(task).await.expect("Failed to store task");

        let clock_dyn: Arc<dyn tollgate_controller::Clock> = clock.clone();
        Self {
            key,
            reconciler: Reconciler::new(Arc::clone(&store), clock_dyn),
            client: VoteClient::new(Arc::clone(&store)),
            store,
            clock,
        }
    }

    /// Replace the reconciler timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.reconciler = self.reconciler.with_timeout(timeout);
        self
    }

    /// Cast a vote through admission.
    ///
    /// # Errors
    ///
    /// Whatever the vote client returns.
    pub async fn vote(&self, principal: &Principal, input: VoteInput) -> ControllerResult<ApprovalTask> {
        self.client.vote(&self.key, principal, input, None).await
    }

    /// Run one reconcile pass.
    ///
    /// # Panics
    ///
    /// Panics if the pass fails.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        self.reconciler
            .reconcile(&self.key)
            .await
            .expect("Reconcile failed")
    }

    /// The stored task.
    ///
    /// # Panics
    ///
    /// Panics if the task is gone.
    pub async fn task(&self) -> ApprovalTask {
        self.store.get(&self.key).await.expect("Task missing")
    }
}
