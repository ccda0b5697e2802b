use std::sync::Arc;

use tokio::sync::broadcast;

use jukebox_types::events::InboundFrame;

/// Fans inbound frames out to any number of subscribers. Outlives individual
/// connections, so subscribers keep receiving across reconnects.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<InboundFrame>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to inbound frames. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundFrame> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn has_subscribers(&self) -> bool {
        self.inner.broadcast_tx.receiver_count() > 0
    }

    /// Deliver a frame to every current subscriber.
    pub fn broadcast(&self, frame: InboundFrame) {
        let _ = self.inner.broadcast_tx.send(frame);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
