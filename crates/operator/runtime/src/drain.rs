//! Queue drainer
//!
//! Each pending item is claimed (Pending → Executing) and run on its own
//! task, so N pending items become N concurrent invocations and one slow
//! operator never holds up another. Items are claimed in arrival order;
//! completion order is whatever the operators make it.

use crate::dispatcher::Dispatcher;
use crate::observer::SubscriptionId;
use crate::queue::{InvocationRequestQueue, QueueItem};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Failure recorded for requests nested deeper than the configured bound
pub const DEPTH_EXCEEDED: &str = "trigger depth exceeded";

pub struct QueueDrainer {
    dispatcher: Arc<Dispatcher>,
    queue: Arc<InvocationRequestQueue>,
    /// Deepest trigger chain that still runs; `None` means unbounded
    max_depth: Option<u32>,
}

impl QueueDrainer {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        queue: Arc<InvocationRequestQueue>,
        max_depth: Option<u32>,
    ) -> Self {
        Self {
            dispatcher,
            queue,
            max_depth,
        }
    }

    /// Drain continuously in the background until the handle is stopped
    pub fn start(self: Arc<Self>) -> DrainerHandle {
        let wake = Arc::new(Notify::new());
        let waker = wake.clone();
        let subscription = self
            .queue
            .subscribe(Arc::new(move |_snapshot| waker.notify_one()));
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let drainer = self.clone();
        let task = tokio::spawn(async move {
            tracing::info!("Queue drainer started");
            loop {
                while let Some(item) = drainer.queue.claim_next_pending() {
                    let worker = drainer.clone();
                    tokio::spawn(async move { worker.run_item(item).await });
                }

                tokio::select! {
                    _ = wake.notified() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Queue drainer stopped");
        });

        DrainerHandle {
            queue: self.queue.clone(),
            subscription,
            stop_tx,
            task: Some(task),
        }
    }

    /// Run every pending item, including the ones they trigger, until none remain
    ///
    /// Returns how many items ran.
    pub async fn drain_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let mut batch = Vec::new();
            while let Some(item) = self.queue.claim_next_pending() {
                batch.push(item);
            }
            if batch.is_empty() {
                return total;
            }
            total += batch.len();
            futures::future::join_all(batch.into_iter().map(|item| self.run_item(item))).await;
        }
    }

    /// Execute one claimed item and record its outcome
    async fn run_item(&self, item: QueueItem) {
        let id = item.id.clone();

        let recorded = match self.max_depth {
            Some(max) if item.request.depth > max => {
                tracing::warn!(
                    item_id = %id,
                    operator_uri = %item.request.operator_uri,
                    depth = item.request.depth,
                    max_depth = max,
                    "Dropping request: trigger depth exceeded"
                );
                self.queue.mark_as_failed_with(&id, DEPTH_EXCEEDED)
            }
            _ => match self.dispatcher.execute_request(&item.request).await {
                Ok(result) => match result.error_text() {
                    Some(error) => self.queue.mark_as_failed_with(&id, error),
                    None => self.queue.mark_as_completed_with(&id, result.result),
                },
                Err(e) => {
                    tracing::warn!(item_id = %id, error = %e, "Queued invocation did not run");
                    self.queue.mark_as_failed_with(&id, e.to_string())
                }
            },
        };

        if let Err(e) = recorded {
            tracing::error!(item_id = %id, error = %e, "Failed to record queue item outcome");
        }
    }
}

/// Handle to a running drainer
pub struct DrainerHandle {
    queue: Arc<InvocationRequestQueue>,
    subscription: SubscriptionId,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl DrainerHandle {
    /// Stop claiming new items; items already running finish on their own
    pub async fn stop(mut self) {
        self.queue.unsubscribe(self.subscription);
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Queue drainer task failed");
            }
        }
    }
}

impl Drop for DrainerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.queue.unsubscribe(self.subscription);
            task.abort();
        }
    }
}
