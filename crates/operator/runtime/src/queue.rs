//! Invocation request queue
//!
//! A fan-out worklist of pending, running and finished invocations. Every
//! mutation notifies subscribers with an immutable snapshot of the whole
//! queue. Items keep arrival order; completion order is up to whoever
//! drains them. Status only moves forward:
//!
//! ```text
//! Pending ──▶ Executing ──▶ Completed
//!    │            │
//!    └────────────┴───────▶ Failed
//! ```

use crate::observer::{lock, Callback, Observers, SubscriptionId};
use chrono::{DateTime, Utc};
use operator_types::{InvocationRequest, OperatorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

// ── Identifiers and status ───────────────────────────────────────────

/// Unique identifier for a queue item
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueItemId(pub String);

impl QueueItemId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueItemStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl QueueItemStatus {
    fn rank(self) -> u8 {
        match self {
            QueueItemStatus::Pending => 0,
            QueueItemStatus::Executing => 1,
            QueueItemStatus::Completed | QueueItemStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Executing => "executing",
            QueueItemStatus::Completed => "completed",
            QueueItemStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One queued invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub request: InvocationRequest,
    pub status: QueueItemStatus,
    /// Result payload recorded on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure recorded on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    fn new(request: InvocationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: QueueItemId::generate(),
            request,
            status: QueueItemStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueueItemStatus::Pending
    }
}

/// Immutable view of the queue handed to subscribers
pub type QueueSnapshot = Arc<[QueueItem]>;

// ── Queue ────────────────────────────────────────────────────────────

/// Concurrently drained worklist of invocation requests
pub struct InvocationRequestQueue {
    items: Mutex<Vec<QueueItem>>,
    observers: Observers<QueueSnapshot>,
}

impl InvocationRequestQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            observers: Observers::new(),
        }
    }

    /// Append a pending item and notify subscribers
    pub fn add(&self, request: InvocationRequest) -> QueueItemId {
        let item = QueueItem::new(request);
        let id = item.id.clone();
        tracing::debug!(item_id = %id, operator_uri = %item.request.operator_uri, "Invocation queued");

        let snapshot = {
            let mut items = lock(&self.items);
            items.push(item);
            Self::snapshot_of(&items)
        };
        self.observers.notify(&snapshot);
        id
    }

    /// Register a subscriber
    ///
    /// A subscriber joining while pending items exist is notified right away.
    pub fn subscribe(&self, callback: Callback<QueueSnapshot>) -> SubscriptionId {
        let id = self.observers.subscribe(callback);
        let snapshot = self.items();
        if snapshot.iter().any(QueueItem::is_pending) {
            self.observers.notify_one(id, &snapshot);
        }
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn mark_as_executing(&self, id: &QueueItemId) -> Result<()> {
        self.transition(id, QueueItemStatus::Executing, None, None)
    }

    pub fn mark_as_completed(&self, id: &QueueItemId) -> Result<()> {
        self.transition(id, QueueItemStatus::Completed, None, None)
    }

    /// Complete an item and keep its result payload
    pub fn mark_as_completed_with(&self, id: &QueueItemId, result: Option<Value>) -> Result<()> {
        self.transition(id, QueueItemStatus::Completed, result, None)
    }

    pub fn mark_as_failed(&self, id: &QueueItemId) -> Result<()> {
        self.transition(id, QueueItemStatus::Failed, None, None)
    }

    /// Fail an item and keep the reason
    pub fn mark_as_failed_with(&self, id: &QueueItemId, error: impl Into<String>) -> Result<()> {
        self.transition(id, QueueItemStatus::Failed, None, Some(error.into()))
    }

    /// Atomically move the oldest pending item to executing and return it
    pub fn claim_next_pending(&self) -> Option<QueueItem> {
        let (claimed, snapshot) = {
            let mut items = lock(&self.items);
            let item = items.iter_mut().find(|item| item.is_pending())?;
            item.status = QueueItemStatus::Executing;
            item.updated_at = Utc::now();
            let claimed = item.clone();
            (claimed, Self::snapshot_of(&items))
        };
        self.observers.notify(&snapshot);
        Some(claimed)
    }

    /// Drop completed items, keeping the relative order of the rest
    pub fn clean(&self) -> usize {
        let (removed, snapshot) = {
            let mut items = lock(&self.items);
            let before = items.len();
            items.retain(|item| item.status != QueueItemStatus::Completed);
            (before - items.len(), Self::snapshot_of(&items))
        };
        if removed > 0 {
            self.observers.notify(&snapshot);
        }
        removed
    }

    /// Oldest pending item, without dequeuing it
    pub fn get_next_pending_request(&self) -> Option<QueueItem> {
        lock(&self.items).iter().find(|item| item.is_pending()).cloned()
    }

    pub fn get(&self, id: &QueueItemId) -> Option<QueueItem> {
        lock(&self.items).iter().find(|item| &item.id == id).cloned()
    }

    pub fn items(&self) -> QueueSnapshot {
        Self::snapshot_of(&lock(&self.items))
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.items).iter().filter(|item| item.is_pending()).count()
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn transition(
        &self,
        id: &QueueItemId,
        to: QueueItemStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<()> {
        let snapshot = {
            let mut items = lock(&self.items);
            let item = items
                .iter_mut()
                .find(|item| &item.id == id)
                .ok_or_else(|| OperatorError::QueueItemNotFound(id.to_string()))?;

            if to.rank() <= item.status.rank() {
                tracing::warn!(item_id = %id, from = %item.status, to = %to, "Rejected queue status regression");
                return Err(OperatorError::InvalidTransition {
                    id: id.to_string(),
                    from: item.status.to_string(),
                    to: to.to_string(),
                });
            }

            item.status = to;
            item.updated_at = Utc::now();
            if result.is_some() {
                item.result = result;
            }
            if error.is_some() {
                item.error = error;
            }
            Self::snapshot_of(&items)
        };
        self.observers.notify(&snapshot);
        Ok(())
    }

    fn snapshot_of(items: &[QueueItem]) -> QueueSnapshot {
        items.to_vec().into()
    }
}

impl Default for InvocationRequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(uri: &str) -> InvocationRequest {
        InvocationRequest::new(uri, json!({}))
    }

    fn recorder() -> (Arc<Mutex<Vec<QueueSnapshot>>>, Callback<QueueSnapshot>) {
        let seen: Arc<Mutex<Vec<QueueSnapshot>>> = Arc::default();
        let sink = seen.clone();
        (seen, Arc::new(move |snapshot: &QueueSnapshot| sink.lock().unwrap().push(snapshot.clone())))
    }

    #[test]
    fn test_add_notifies_every_subscriber() {
        let queue = InvocationRequestQueue::new();
        let recorders: Vec<_> = (0..3).map(|_| recorder()).collect();
        for (_, callback) in &recorders {
            queue.subscribe(callback.clone());
        }

        let id = queue.add(request("a"));

        for (seen, _) in &recorders {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].len(), 1);
            assert_eq!(seen[0][0].id, id);
            assert_eq!(seen[0][0].status, QueueItemStatus::Pending);
        }
    }

    #[test]
    fn test_late_subscriber_catches_up() {
        let queue = InvocationRequestQueue::new();
        let (seen, callback) = recorder();
        queue.subscribe(callback);
        assert!(seen.lock().unwrap().is_empty());

        queue.add(request("a"));
        let (late, late_callback) = recorder();
        queue.subscribe(late_callback);
        assert_eq!(late.lock().unwrap().len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_catch_up_without_pending_items() {
        let queue = InvocationRequestQueue::new();
        let id = queue.add(request("a"));
        queue.mark_as_executing(&id).unwrap();

        let (seen, callback) = recorder();
        queue.subscribe(callback);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let queue = InvocationRequestQueue::new();
        let id = queue.add(request("a"));

        queue.mark_as_executing(&id).unwrap();
        assert!(matches!(
            queue.mark_as_executing(&id),
            Err(OperatorError::InvalidTransition { .. })
        ));
        queue.mark_as_completed_with(&id, Some(json!({ "ok": true }))).unwrap();
        assert!(queue.mark_as_failed(&id).is_err());

        let item = queue.get(&id).unwrap();
        assert_eq!(item.status, QueueItemStatus::Completed);
        assert_eq!(item.result, Some(json!({ "ok": true })));
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let queue = InvocationRequestQueue::new();
        let id = queue.add(request("a"));
        queue.mark_as_failed_with(&id, "trigger depth exceeded").unwrap();
        let item = queue.get(&id).unwrap();
        assert_eq!(item.status, QueueItemStatus::Failed);
        assert_eq!(item.error.as_deref(), Some("trigger depth exceeded"));
    }

    #[test]
    fn test_unknown_item() {
        let queue = InvocationRequestQueue::new();
        let missing = QueueItemId::generate();
        assert!(matches!(
            queue.mark_as_completed(&missing),
            Err(OperatorError::QueueItemNotFound(_))
        ));
    }

    #[test]
    fn test_clean_removes_only_completed_and_keeps_order() {
        let queue = InvocationRequestQueue::new();
        let a = queue.add(request("a"));
        let b = queue.add(request("b"));
        let c = queue.add(request("c"));
        let d = queue.add(request("d"));

        queue.mark_as_executing(&b).unwrap();
        queue.mark_as_completed(&b).unwrap();
        queue.mark_as_failed(&d).unwrap();

        assert_eq!(queue.clean(), 1);
        let ids: Vec<QueueItemId> = queue.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![a, c, d]);
    }

    #[test]
    fn test_peek_and_claim() {
        let queue = InvocationRequestQueue::new();
        assert!(queue.get_next_pending_request().is_none());

        let a = queue.add(request("a"));
        let b = queue.add(request("b"));

        assert_eq!(queue.get_next_pending_request().unwrap().id, a);
        assert_eq!(queue.pending_count(), 2);

        let claimed = queue.claim_next_pending().unwrap();
        assert_eq!(claimed.id, a);
        assert_eq!(claimed.status, QueueItemStatus::Executing);
        assert_eq!(queue.get_next_pending_request().unwrap().id, b);
        assert_eq!(queue.claim_next_pending().unwrap().id, b);
        assert!(queue.claim_next_pending().is_none());
    }

    #[test]
    fn test_snapshots_are_immutable_copies() {
        let queue = InvocationRequestQueue::new();
        let id = queue.add(request("a"));
        let before = queue.items();
        queue.mark_as_executing(&id).unwrap();
        assert_eq!(before[0].status, QueueItemStatus::Pending);
        assert_eq!(queue.items()[0].status, QueueItemStatus::Executing);
    }
}
