//! # Change Events
//!
//! Outbound notifications emitted by the control loops when a server row
//! materially changes. The transport fanning these out to connected clients
//! is an external collaborator; the loops only see the [`NotificationSink`]
//! boundary and call it synchronously after a successful commit.

use crate::ids::{AreaId, RegionId, ServerId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Snapshot of a server row after a material change.
///
/// The payload carries everything a connected client needs to decide whether
/// and where to reconnect: coverage (area ids/indexes), availability
/// (`enabled`/`active`) and connectivity (`public_ip`/port/url).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerUpdatedEvent {
    pub server_id: ServerId,
    /// Row version after the change, for client-side ordering.
    pub version: u64,
    pub region_id: RegionId,
    pub area_ids: Vec<AreaId>,
    pub area_indexes: Vec<u32>,
    pub enabled: bool,
    pub active: bool,
    pub public_ip: Option<String>,
    pub public_web_socket_port: Option<u16>,
    pub web_socket_url: Option<String>,
}

/// Outbound channel for server change events.
///
/// Implementations must be cheap and non-blocking: the reconciler calls this
/// inline at the end of a tick.
pub trait NotificationSink: Send + Sync {
    /// Publishes a server change. Delivery is best-effort; a full or
    /// subscriber-less channel must not fail the reconciliation that
    /// produced the event.
    fn server_updated(&self, event: ServerUpdatedEvent);
}

/// [`NotificationSink`] backed by a tokio broadcast channel.
///
/// Whatever transport actually fans events out to clients subscribes via
/// [`BroadcastNotificationSink::subscribe`] and forwards from there.
#[derive(Debug)]
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<ServerUpdatedEvent>,
}

impl BroadcastNotificationSink {
    /// Creates a sink with the given channel capacity. Slow subscribers that
    /// fall more than `capacity` events behind observe a lag error and
    /// resubscribe from current state.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Opens a new subscription for all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerUpdatedEvent> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastNotificationSink {
    fn server_updated(&self, event: ServerUpdatedEvent) {
        // send only errors when there are no subscribers, which is fine
        if self.sender.send(event).is_err() {
            trace!("Server update dropped: no subscribers");
        }
    }
}

/// [`NotificationSink`] that remembers every event; test support.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    events: std::sync::Mutex<Vec<ServerUpdatedEvent>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in order.
    pub fn events(&self) -> Vec<ServerUpdatedEvent> {
        self.events.lock().expect("sink lock poisoned").clone()
    }

    /// Drops recorded events.
    pub fn clear(&self) {
        self.events.lock().expect("sink lock poisoned").clear();
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn server_updated(&self, event: ServerUpdatedEvent) {
        self.events.lock().expect("sink lock poisoned").push(event);
    }
}
