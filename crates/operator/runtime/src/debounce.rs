//! Leading + trailing debouncer
//!
//! Timing semantics, with `window` as the coalescing window:
//!
//! - a call made while the debouncer is idle fires immediately (leading edge)
//!   and opens a window
//! - calls made while a window is open are coalesced; when it closes, the
//!   latest value fires (trailing edge) and opens another window
//! - a window that closes with nothing pending returns the debouncer to idle
//!
//! Fires never overlap: the action for one value completes before the next
//! value is considered. Dropping the debouncer flushes a pending trailing
//! value and stops the worker.

use crate::error::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Async action run for each fired value
pub type DebouncedAction<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct Debouncer<T> {
    window: Duration,
    tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawn the debouncer worker on the current tokio runtime
    ///
    /// Fails when called outside a runtime; use [`Debouncer::with_handle`]
    /// from other threads.
    pub fn new(window: Duration, action: DebouncedAction<T>) -> Result<Self> {
        let handle = Handle::try_current()?;
        Ok(Self::with_handle(&handle, window, action))
    }

    /// Spawn the debouncer worker on `handle`
    pub fn with_handle(handle: &Handle, window: Duration, action: DebouncedAction<T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run(window, rx, action));
        Self { window, tx }
    }

    /// Offer a value; returns `false` if the worker has stopped
    pub fn call(&self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

async fn run<T>(window: Duration, mut rx: mpsc::UnboundedReceiver<T>, action: DebouncedAction<T>) {
    while let Some(first) = rx.recv().await {
        action(first).await;

        let mut deadline = Instant::now() + window;
        let mut pending: Option<T> = None;
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(value) => pending = Some(value),
                    None => {
                        if let Some(value) = pending.take() {
                            action(value).await;
                        }
                        return;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => match pending.take() {
                    Some(value) => {
                        action(value).await;
                        deadline = Instant::now() + window;
                    }
                    None => break,
                },
            }
        }
    }
}
