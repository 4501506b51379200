//! Normalized player events and the host-facing event bus
//!
//! Both engines report through adapters into one vocabulary, so host code
//! sees the same events whichever technology is active.

use crate::types::Technology;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Connection state reported by the realtime transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IceState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl IceState {
    /// Media is flowing
    pub fn is_established(&self) -> bool {
        matches!(self, IceState::Connected | IceState::Completed)
    }

    /// The connection is gone and the attempt cannot recover by itself
    pub fn is_lost(&self) -> bool {
        matches!(
            self,
            IceState::Failed | IceState::Disconnected | IceState::Closed
        )
    }
}

/// Informational message from the realtime transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "info", rename_all = "snake_case")]
pub enum RealtimeInfo {
    IceConnectionStateChanged { state: IceState },
    /// The signalling socket was closed by the server
    Closed,
    /// The publisher changed resolution and the stream is renegotiating
    ResolutionChange,
    /// A stream the client was waiting for went live
    StreamStarted { stream_id: String },
    Other { name: String },
}

/// Error code reported by the realtime transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeError {
    pub code: String,
}

impl RealtimeError {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Payload of a generic playback error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackError {
    pub technology: Option<Technology>,
    pub message: String,
}

/// Technology-agnostic playback event
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Play,
    Playing,
    Pause,
    Ended,
    Seeked,
    Error(PlaybackError),
    Progress { buffered_percent: f64 },
    TimeUpdate { current_time: f64 },
    VolumeChange { volume: f64, muted: bool },
    RateChange { playback_rate: f64 },
    RealtimeInfo(RealtimeInfo),
    RealtimeError(RealtimeError),
    RealtimeData(Bytes),
    Metadata(String),
}

impl PlayerEvent {
    /// Event name as seen by host listeners
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Play => "play",
            PlayerEvent::Playing => "playing",
            PlayerEvent::Pause => "pause",
            PlayerEvent::Ended => "ended",
            PlayerEvent::Seeked => "seeked",
            PlayerEvent::Error(_) => "error",
            PlayerEvent::Progress { .. } => "progress",
            PlayerEvent::TimeUpdate { .. } => "timeupdate",
            PlayerEvent::VolumeChange { .. } => "volumechange",
            PlayerEvent::RateChange { .. } => "ratechange",
            PlayerEvent::RealtimeInfo(_) => "webrtc-info",
            PlayerEvent::RealtimeError(_) => "webrtc-error",
            PlayerEvent::RealtimeData(_) => "webrtc-data-received",
            PlayerEvent::Metadata(_) => "id3",
        }
    }
}

/// Listener for generic playback events
pub type PlayerListener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// Listener for data received over the realtime data channel
pub type DataListener = Arc<dyn Fn(&Bytes) + Send + Sync>;

/// Listener for timed metadata text
pub type MetadataListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Single-slot listener registry. Registering again replaces the previous
/// listener for that concern.
#[derive(Default, Clone)]
pub struct EventBus {
    player: Option<PlayerListener>,
    data: Option<DataListener>,
    metadata: Option<MetadataListener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_player_listener(&mut self, listener: PlayerListener) {
        self.player = Some(listener);
    }

    pub fn set_data_listener(&mut self, listener: DataListener) {
        self.data = Some(listener);
    }

    pub fn set_metadata_listener(&mut self, listener: MetadataListener) {
        self.metadata = Some(listener);
    }

    /// Deliver an event to the listener responsible for it
    pub fn dispatch(&self, event: PlayerEvent) {
        trace!(event = event.name(), "Dispatching player event");
        match event {
            PlayerEvent::RealtimeData(data) => {
                if let Some(ref listener) = self.data {
                    listener(&data);
                }
            }
            PlayerEvent::Metadata(text) => {
                if let Some(ref listener) = self.metadata {
                    listener(&text);
                }
            }
            other => {
                if let Some(ref listener) = self.player {
                    listener(&other);
                }
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("player", &self.player.is_some())
            .field("data", &self.data.is_some())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_routes_by_concern() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut bus = EventBus::new();

        let s = seen.clone();
        bus.set_player_listener(Arc::new(move |e: &PlayerEvent| s.lock().unwrap().push(e.name().to_string())));
        let s = seen.clone();
        bus.set_data_listener(Arc::new(move |d: &Bytes| s.lock().unwrap().push(format!("data:{}", d.len()))));
        let s = seen.clone();
        bus.set_metadata_listener(Arc::new(move |t: &str| s.lock().unwrap().push(format!("id3:{}", t))));

        bus.dispatch(PlayerEvent::Play);
        bus.dispatch(PlayerEvent::RealtimeData(Bytes::from_static(b"abc")));
        bus.dispatch(PlayerEvent::Metadata("title".into()));
        bus.dispatch(PlayerEvent::TimeUpdate { current_time: 1.5 });

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["play", "data:3", "id3:title", "timeupdate"]
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();

        let c = first.clone();
        bus.set_player_listener(Arc::new(move |_: &PlayerEvent| *c.lock().unwrap() += 1));
        let c = second.clone();
        bus.set_player_listener(Arc::new(move |_: &PlayerEvent| *c.lock().unwrap() += 1));

        bus.dispatch(PlayerEvent::Pause);
        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);
    }

    #[test]
    fn test_dispatch_without_listeners() {
        EventBus::new().dispatch(PlayerEvent::Ended);
    }

    #[test]
    fn test_ice_state_classification() {
        assert!(IceState::Completed.is_established());
        assert!(IceState::Disconnected.is_lost());
        assert!(!IceState::Checking.is_lost());
    }
}
