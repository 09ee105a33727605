use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::trace;

use rollcall_types::events::GatewayEvent;

const FEED_CAPACITY: usize = 1024;

/// Fans gateway events out to every connected feed.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Every connection receives every event and filters by its own subscriptions
    broadcast_tx: broadcast::Sender<GatewayEvent>,
    connections: AtomicUsize,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. No-op when nobody is listening.
    pub fn broadcast(&self, event: GatewayEvent) {
        if self.inner.broadcast_tx.send(event).is_err() {
            trace!("No feed listeners, event dropped");
        }
    }

    pub fn connected(&self) -> usize {
        self.inner.connections.load(Ordering::Relaxed)
    }

    pub(crate) fn connection_opened(&self) -> usize {
        self.inner.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn connection_closed(&self) -> usize {
        self.inner.connections.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
