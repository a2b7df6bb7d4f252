//! Abortable operation queue
//!
//! Every streaming invocation registers here for as long as its stream is
//! open. Cancellation is scoped by operator URI: [`AbortableOperationQueue::abort_by_uri`]
//! cancels every in-flight stream for that URI. An entry is removed exactly
//! once, either by the abort itself or when its [`AbortRegistration`] is
//! dropped at the end of the stream.

use crate::observer::lock;
use operator_types::OperatorUri;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Cancellation signal handed to a streaming call
#[derive(Clone, Debug)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the operation is aborted; never resolves otherwise
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                if *self.rx.borrow() {
                    return;
                }
                futures::future::pending::<()>().await;
            }
        }
    }
}

struct AbortableOperation {
    id: u64,
    uri: OperatorUri,
    params: Value,
    cancel: watch::Sender<bool>,
}

type Operations = Arc<Mutex<Vec<AbortableOperation>>>;

/// Registry of in-flight streaming invocations
#[derive(Default)]
pub struct AbortableOperationQueue {
    next_id: AtomicU64,
    operations: Operations,
}

impl AbortableOperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream; keep the returned guard alive while it runs
    pub fn add(&self, uri: OperatorUri, params: Value) -> AbortRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel, rx) = watch::channel(false);
        lock(&self.operations).push(AbortableOperation {
            id,
            uri,
            params,
            cancel,
        });
        AbortRegistration {
            id,
            operations: self.operations.clone(),
            signal: AbortSignal { rx },
        }
    }

    /// Cancel every in-flight stream for `uri`; returns how many were cancelled
    pub fn abort_by_uri(&self, uri: &OperatorUri) -> usize {
        let aborted: Vec<AbortableOperation> = {
            let mut operations = lock(&self.operations);
            let (matching, rest) = std::mem::take(&mut *operations)
                .into_iter()
                .partition(|operation| &operation.uri == uri);
            *operations = rest;
            matching
        };

        for operation in &aborted {
            tracing::debug!(operator_uri = %operation.uri, params = %operation.params, "Aborting stream");
            let _ = operation.cancel.send(true);
        }
        if !aborted.is_empty() {
            tracing::info!(operator_uri = %uri, count = aborted.len(), "Aborted streaming operations");
        }
        aborted.len()
    }

    pub fn count_for(&self, uri: &OperatorUri) -> usize {
        lock(&self.operations)
            .iter()
            .filter(|operation| &operation.uri == uri)
            .count()
    }

    pub fn len(&self) -> usize {
        lock(&self.operations).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Guard for one registered stream
///
/// Dropping it removes the entry unless an abort already did.
pub struct AbortRegistration {
    id: u64,
    operations: Operations,
    signal: AbortSignal,
}

impl AbortRegistration {
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }
}

impl Drop for AbortRegistration {
    fn drop(&mut self) {
        lock(&self.operations).retain(|operation| operation.id != self.id);
    }
}
