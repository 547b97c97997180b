//! Outward notifications for the UI and persistence collaborators.
//!
//! The core publishes [`Event`]s on a broadcast channel; collaborators call
//! [`Notifier::subscribe`] and receive every event published afterwards.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::stream::StreamStatus;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The node is authenticated and serving requests
    NodeUp,
    /// The node process exited or was stopped
    NodeDown { reason: String },
    /// The node connection is unrecoverable in this session
    ForceLogout { reason: String },
    RelayUp,
    RelayDown,
    /// A payment for `part` (1-based) has been written to the stream's payment call
    PartInitiated { id: String, part: u64, payment_request: String, payment_hash: String },
    /// `current_part` parts of the stream have been paid
    Progress { id: String, current_part: u64 },
    StatusChanged { id: String, status: StreamStatus },
    Finished { id: String, current_part: u64 },
    /// The stream was paused because of an error
    StreamError { id: String, message: String },
}

/// Publisher side of the event bus, cheap to clone
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Event>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Notifier { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event; dropped silently when nobody is subscribed
    pub fn notify(&self, event: Event) {
        tracing::debug!("notify {:?}", event);
        let _ = self.sender.send(event);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
