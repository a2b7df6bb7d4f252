//! Lifecycle sweeps
//!
//! Queues every executable operator that listens to an event. The sweep
//! does no deduplication; firing the same event twice queues twice.

use crate::queue::{InvocationRequestQueue, QueueItemId};
use crate::registry::OperatorRegistry;
use operator_types::{InvocationRequest, LifecycleEvent};
use serde_json::json;

/// Queue one invocation per operator listening to `event`
pub fn execute_operators_for_event(
    registry: &OperatorRegistry,
    queue: &InvocationRequestQueue,
    event: LifecycleEvent,
) -> Vec<QueueItemId> {
    let ids: Vec<QueueItemId> = registry
        .list_operators()
        .into_iter()
        .filter(|operator| {
            let config = operator.config();
            config.can_execute && config.listens_to(event)
        })
        .map(|operator| queue.add(InvocationRequest::new(operator.uri().as_str(), json!({}))))
        .collect();

    tracing::info!(event = ?event, queued = ids.len(), "Lifecycle sweep");
    ids
}
