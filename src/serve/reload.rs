// src/serve/reload.rs

//! Reload signalling between the build runtime and connected browser clients,
//! built on a tokio broadcast channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// A reload notification, carrying the task that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSignal {
    pub task: String,
}

/// Hub connecting the runtime (publisher) to dev-server clients (subscribers).
///
/// Publishing with no subscribers is a no-op; events published before a
/// client subscribes are not replayed.
#[derive(Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadSignal>,
    /// Number of signals published (for diagnostics).
    signal_count: Arc<AtomicUsize>,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            signal_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Notify all connected clients to refresh.
    ///
    /// Returns the number of subscribers that received the signal.
    pub fn publish(&self, task: &str) -> usize {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        self.sender
            .send(ReloadSignal {
                task: task.to_string(),
            })
            .unwrap_or(0)
    }

    /// Subscribe to reload signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.sender.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total number of signals published.
    pub fn signal_count(&self) -> usize {
        self.signal_count.load(Ordering::Relaxed)
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReloadHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHub")
            .field("subscriber_count", &self.subscriber_count())
            .field("signal_count", &self.signal_count())
            .finish()
    }
}
