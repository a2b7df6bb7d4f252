//! Side-effect accumulator for one invocation
//!
//! An [`Executor`] collects the invocation requests (triggers) and log
//! lines an operator produces while it runs. When the run finishes the
//! dispatcher calls [`Executor::queue_requests`], which moves every
//! collected request onto the invocation queue.

use crate::observer::lock;
use crate::queue::{InvocationRequestQueue, QueueItemId};
use operator_types::{ExecutorPayload, InvocationRequest};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ExecutorState {
    requests: Vec<InvocationRequest>,
    logs: Vec<String>,
}

/// Shared handle to the accumulator of one run
#[derive(Clone, Debug, Default)]
pub struct Executor {
    /// Depth of the invocation that owns this executor
    depth: u32,
    state: Arc<Mutex<ExecutorState>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor for an invocation that is itself `depth` triggers deep
    pub fn at_depth(depth: u32) -> Self {
        Self {
            depth,
            state: Arc::default(),
        }
    }

    /// Rebuild a live executor from a peer payload
    ///
    /// Requests raised by the peer are one level deeper than the invocation
    /// that produced them.
    pub fn hydrate(payload: ExecutorPayload, depth: u32) -> Self {
        let child_depth = depth.saturating_add(1);
        let requests = payload
            .requests
            .into_iter()
            .map(|mut request| {
                request.depth = request.depth.max(child_depth);
                request
            })
            .collect();
        Self {
            depth,
            state: Arc::new(Mutex::new(ExecutorState {
                requests,
                logs: payload.logs,
            })),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Record a request to run another operator after this one
    pub fn trigger(&self, operator_uri: impl Into<String>, params: Value) {
        let request = InvocationRequest::triggered(operator_uri, params, self.depth);
        lock(&self.state).requests.push(request);
    }

    /// Record a log line
    pub fn log(&self, message: impl Into<String>) {
        lock(&self.state).logs.push(message.into());
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn logs(&self) -> Vec<String> {
        lock(&self.state).logs.clone()
    }

    /// Serializable copy of the current state
    pub fn to_payload(&self) -> ExecutorPayload {
        let state = lock(&self.state);
        ExecutorPayload {
            requests: state.requests.clone(),
            logs: state.logs.clone(),
        }
    }

    /// Move every pending request onto `queue`, in trigger order
    ///
    /// Requests are taken out of the executor, so queueing twice never
    /// duplicates work.
    pub fn queue_requests(&self, queue: &InvocationRequestQueue) -> Vec<QueueItemId> {
        let requests = std::mem::take(&mut lock(&self.state).requests);
        if !requests.is_empty() {
            tracing::debug!(count = requests.len(), depth = self.depth, "Queueing triggered requests");
        }
        requests.into_iter().map(|request| queue.add(request)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trigger_and_log() {
        let executor = Executor::at_depth(2);
        executor.trigger("@acme/tools/reload", json!({ "force": true }));
        executor.log("reloading");

        let requests = executor.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].depth, 3);
        assert_eq!(executor.logs(), vec!["reloading"]);
    }

    #[test]
    fn test_queue_requests_drains() {
        let queue = InvocationRequestQueue::new();
        let executor = Executor::new();
        executor.trigger("a", json!({}));
        executor.trigger("b", json!({}));

        let ids = executor.queue_requests(&queue);
        assert_eq!(ids.len(), 2);
        assert!(executor.requests().is_empty());
        assert!(executor.queue_requests(&queue).is_empty());

        let uris: Vec<String> = queue.items().iter().map(|i| i.request.operator_uri.clone()).collect();
        assert_eq!(uris, vec!["a", "b"]);
    }

    #[test]
    fn test_hydrate_bumps_depth() {
        let payload = ExecutorPayload {
            requests: vec![InvocationRequest::new("b", json!({}))],
            logs: vec!["remote log".into()],
        };
        let executor = Executor::hydrate(payload, 4);
        assert_eq!(executor.requests()[0].depth, 5);
        assert_eq!(executor.logs(), vec!["remote log"]);
    }

    #[test]
    fn test_clones_share_state() {
        let executor = Executor::new();
        let handle = executor.clone();
        handle.log("from clone");
        assert_eq!(executor.to_payload().logs, vec!["from clone"]);
    }
}
