//! Task storage with optimistic concurrency.
//!
//! Every write carries the `resource_version` it was based on. The store
//! rejects the write with [`StoreError::Conflict`] if another write landed
//! first, and bumps the version on success.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use tollgate_core::ApprovalTask;

use crate::error::{StoreError, StoreResult};

/// Storage backend for approval tasks, keyed by [`ApprovalTask::key`].
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a task.
    async fn get(&self, key: &str) -> StoreResult<ApprovalTask>;

    /// Store a new task. The stored copy has resource version 1.
    async fn create(&self, task: ApprovalTask) -> StoreResult<ApprovalTask>;

    /// Replace a task's metadata and spec. The stored status is kept.
    async fn update(&self, task: ApprovalTask) -> StoreResult<ApprovalTask>;

    /// Replace a task's status and annotations. Spec and labels are kept.
    async fn update_status(&self, task: ApprovalTask) -> StoreResult<ApprovalTask>;

    /// All stored tasks, ordered by key.
    async fn list(&self) -> StoreResult<Vec<ApprovalTask>>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<String, ApprovalTask>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in an Arc for sharing.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    async fn write_with<F>(&self, incoming: ApprovalTask, apply: F) -> StoreResult<ApprovalTask>
    where
        F: FnOnce(&mut ApprovalTask, ApprovalTask) + Send,
    {
        let key = incoming.key();
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let expected = incoming.metadata.resource_version;
        let actual = stored.metadata.resource_version;
        if expected != actual {
            debug!(task = %key, expected, actual, "Rejecting stale write");
            return Err(StoreError::Conflict {
                key,
                expected,
                actual,
            });
        }

        apply(stored, incoming);
        stored.metadata.resource_version = actual.saturating_add(1);
        trace!(task = %key, version = stored.metadata.resource_version, "Stored write");
        Ok(stored.clone())
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<ApprovalTask> {
        self.tasks
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn create(&self, mut task: ApprovalTask) -> StoreResult<ApprovalTask> {
        let key = task.key();
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        task.metadata.resource_version = 1;
        tasks.insert(key.clone(), task.clone());
        debug!(task = %key, "Created approval task");
        Ok(task)
    }

    async fn update(&self, task: ApprovalTask) -> StoreResult<ApprovalTask> {
        self.write_with(task, |stored, incoming| {
            let version = stored.metadata.resource_version;
            stored.metadata = incoming.metadata;
            stored.metadata.resource_version = version;
            stored.spec = incoming.spec;
        })
        .await
    }

    async fn update_status(&self, task: ApprovalTask) -> StoreResult<ApprovalTask> {
        self.write_with(task, |stored, incoming| {
            stored.metadata.annotations = incoming.metadata.annotations;
            stored.status = incoming.status;
        })
        .await
    }

    async fn list(&self) -> StoreResult<Vec<ApprovalTask>> {
        let mut tasks: Vec<ApprovalTask> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by_key(ApprovalTask::key);
        Ok(tasks)
    }
}
