//! Event system for the playback engine
//!
//! The engine communicates outward through a broadcast [`EventBus`]:
//! control commits and callback-side transitions emit [`PlayerEvent`]s,
//! the UI layer (or test harness) subscribes. Emission is non-blocking in
//! both directions, so events may also be emitted from the real-time
//! audio thread.

use crate::playback::state::TransportState;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Events emitted by the playback engine.
///
/// Serializable so callers can forward them as-is (the CLI prints them as
/// JSON lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Transport state changed (any committed transition)
    StateChanged {
        old_state: TransportState,
        new_state: TransportState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback reached the end of the loaded buffer
    ///
    /// Always accompanied by a StateChanged into Stopped.
    EndOfFile {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Asynchronous error (device failure, underrun)
    ///
    /// `kind` is the stable string from [`crate::error::Error::kind`].
    /// The fields are `Cow` so callback-side reports (underruns) carry
    /// borrowed statics and allocate nothing.
    Error {
        kind: Cow<'static, str>,
        message: Cow<'static, str>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A file was loaded and committed as the current track
    TrackLoaded {
        path: PathBuf,
        frames: usize,
        sample_rate: u32,
        channels: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Output sink was swapped
    DeviceChanged {
        device: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event type name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::StateChanged { .. } => "StateChanged",
            PlayerEvent::EndOfFile { .. } => "EndOfFile",
            PlayerEvent::Error { .. } => "Error",
            PlayerEvent::TrackLoaded { .. } => "TrackLoaded",
            PlayerEvent::DeviceChanged { .. } => "DeviceChanged",
        }
    }
}

/// One-to-many event broadcasting for engine events.
///
/// Thin wrapper over `tokio::sync::broadcast`; cloning shares the
/// underlying channel. `emit` never blocks, which is what permits
/// emission from the audio callback.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    ///
    /// Slow subscribers lag (dropping oldest events) rather than applying
    /// backpressure to the emitter.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case.
    ///
    /// Used on the streaming path, where nobody listening is fine.
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
