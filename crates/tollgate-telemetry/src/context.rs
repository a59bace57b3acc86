//! Correlation context for admission reviews and reconcile passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::Instrument;
use uuid::Uuid;

/// Context carried through one admission review, reconcile pass or vote.
///
/// The span produced by [`RequestContext::span`] tags every event emitted
/// inside it with the task key and the acting principal, so a single vote
/// can be followed from the client through admission into the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: Uuid,
    /// Shared by a request and all of its children.
    pub correlation_id: Uuid,
    /// Parent request ID if this is a sub-request.
    pub parent_id: Option<Uuid>,
    /// When the request started.
    pub started_at: DateTime<Utc>,
    /// Component that created this context (`admission`, `reconciler`, ...).
    pub source: String,
    /// Operation being performed.
    pub operation: Option<String>,
    /// Key of the approval task being handled.
    pub task: Option<String>,
    /// Username of the acting principal.
    pub principal: Option<String>,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RequestContext {
    /// Create a new root context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            request_id: id,
            correlation_id: id,
            parent_id: None,
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            task: None,
            principal: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a child context that keeps the correlation ID, task and
    /// principal of this one.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.request_id),
            started_at: Utc::now(),
            source: source.into(),
            operation: None,
            task: self.task.clone(),
            principal: self.principal.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Set the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the task key.
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Set the acting principal.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Add metadata.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Milliseconds since the context was created. Never negative.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0)
    }

    /// Create a tracing span with this context.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            correlation_id = %self.correlation_id,
            source = %self.source,
            operation = self.operation.as_deref(),
            task = self.task.as_deref(),
            principal = self.principal.as_deref(),
        )
    }

    /// Run `fut` inside this context's span, logging its start and
    /// completion.
    ///
    /// Use this for async work. The span is entered only while `fut` is
    /// polled, so the returned future stays `Send` whenever `fut` is.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        let span = self.span();
        async move {
            tracing::debug!("Request started");
            let output = fut.await;
            tracing::debug!(elapsed_ms = self.elapsed_ms(), "Request completed");
            output
        }
        .instrument(span)
        .await
    }

    /// First eight characters of the request ID.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.request_id.simple().to_string();
        id.truncate(8);
        id
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Enters the context's span and logs completion on drop.
///
/// For synchronous code only. Never hold one across an `.await`; use
/// [`RequestContext::scope`] instead.
pub struct RequestGuard {
    context: RequestContext,
    _span: tracing::span::EnteredSpan,
}

impl RequestGuard {
    /// Enter `context`'s span.
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        let span = context.span().entered();
        tracing::debug!("Request started");
        Self {
            context,
            _span: span,
        }
    }

    /// Get the request context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        tracing::debug!(elapsed_ms = self.context.elapsed_ms(), "Request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_creation() {
        let ctx = RequestContext::new("admission");
        assert_eq!(ctx.source, "admission");
        assert_eq!(ctx.request_id, ctx.correlation_id);
        assert!(ctx.parent_id.is_none());
        assert!(ctx.task.is_none());
        assert!(ctx.principal.is_none());
    }

    #[test]
    fn test_request_context_builder() {
        let correlation = Uuid::new_v4();
        let ctx = RequestContext::new("admission")
            .with_correlation_id(correlation)
            .with_operation("UPDATE")
            .with_task("ci/deploy-gate")
            .with_principal("alice")
            .with_metadata("resourceVersion", "7");

        assert_eq!(ctx.correlation_id, correlation);
        assert_eq!(ctx.operation.as_deref(), Some("UPDATE"));
        assert_eq!(ctx.task.as_deref(), Some("ci/deploy-gate"));
        assert_eq!(ctx.principal.as_deref(), Some("alice"));
        assert_eq!(
            ctx.metadata.get("resourceVersion").map(String::as_str),
            Some("7")
        );
    }

    #[test]
    fn test_child_context_inherits_task_and_principal() {
        let parent = RequestContext::new("client")
            .with_task("deploy-gate")
            .with_principal("bob")
            .with_operation("vote");

        let child = parent.child("admission");

        assert_ne!(child.request_id, parent.request_id);
        assert_eq!(child.correlation_id, parent.correlation_id);
        assert_eq!(child.parent_id, Some(parent.request_id));
        assert_eq!(child.task.as_deref(), Some("deploy-gate"));
        assert_eq!(child.principal.as_deref(), Some("bob"));
        assert!(child.operation.is_none());
    }

    #[test]
    fn test_elapsed_is_non_negative() {
        let ctx = RequestContext::new("test");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(ctx.elapsed_ms() >= 5);
    }

    #[test]
    fn test_short_id() {
        let ctx = RequestContext::new("test");
        let short = ctx.short_id();
        assert_eq!(short.len(), 8);
        assert!(ctx.request_id.simple().to_string().starts_with(&short));
    }

    #[test]
    fn test_serialization() {
        let ctx = RequestContext::new("reconciler").with_task("deploy-gate");

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"source\":\"reconciler\""));
        assert!(json.contains("\"task\":\"deploy-gate\""));

        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task.as_deref(), Some("deploy-gate"));
        assert_eq!(parsed.request_id, ctx.request_id);
    }

    #[test]
    fn test_guard_exposes_context() {
        let guard = RequestGuard::new(RequestContext::new("test").with_task("t"));
        assert_eq!(guard.context().task.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_scope_returns_output() {
        let ctx = RequestContext::new("reconciler").with_task("ci/deploy-gate");
        let value = ctx.scope(async { 42 }).await;
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scoped_future_can_be_spawned() {
        let handle = tokio::spawn(RequestContext::new("client").scope(async {
            tokio::task::yield_now().await;
            "done"
        }));
        assert_eq!(handle.await.unwrap(), "done");
    }
}
