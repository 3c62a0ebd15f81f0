//! # Event Bus
//!
//! In-process publish/subscribe for [`LedgerEvent`]s over a tokio
//! broadcast channel.
//!
//! ```text
//! ┌──────────────┐  commit  ┌──────────┐  publish  ┌──────────────────────┐
//! │  Repository  │────────►│ EventBus │──────────►│ Receiver (view A)    │
//! │  mutation    │          │ (256)    │──────────►│ Receiver (bridge)    │
//! └──────────────┘          └──────────┘           └──────────────────────┘
//! ```
//!
//! Publishing never fails: with no subscribers the event is dropped. A
//! receiver that falls more than the channel capacity behind skips the
//! oldest events.

use tally_core::LedgerEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of buffered events per receiver.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Cloneable handle to the ledger's broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    /// Publishes an event, returning how many receivers got it.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        debug!(?event, "Publishing ledger event");
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
        }
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Receiving end of the bus.
#[derive(Debug)]
pub struct EventReceiver {
    inner: broadcast::Receiver<LedgerEvent>,
}

impl EventReceiver {
    /// Waits for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged, skipped events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<LedgerEvent> {
        loop {
            match self.inner.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged, skipped events");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// Drains every buffered event.
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
