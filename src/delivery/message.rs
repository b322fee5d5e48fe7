//! Messages and handle for the delivery worker.
//!
//! The scanner never touches the worker's state. It sends events through a
//! bounded channel with `try_send`, so enqueueing never waits on a delivery
//! in progress. The worker stops on cancellation, or once every handle is
//! dropped and its queue has drained.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::types::KillEvent;

/// Messages accepted by the delivery worker.
#[derive(Debug)]
pub enum DeliveryMessage {
    /// A matched event to deliver.
    Enqueue(Box<KillEvent>),
}

/// Sending half of the worker's channel.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    tx: mpsc::Sender<DeliveryMessage>,
}

impl DeliveryHandle {
    /// Creates a handle and the receiver the worker should run on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DeliveryMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (DeliveryHandle { tx }, rx)
    }

    /// Hands an event to the worker without waiting.
    ///
    /// Returns `false` if the event was dropped because the channel is full
    /// or the worker has stopped.
    pub fn enqueue(&self, event: KillEvent) -> bool {
        let id = event.id;
        match self.tx.try_send(DeliveryMessage::Enqueue(Box::new(event))) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(event_id = %id, "Delivery channel full, dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(event_id = %id, "Delivery worker stopped, dropping event");
                false
            }
        }
    }
}
