//! Core types for Playchain

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback delivery technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    /// Handshake-based realtime transport
    #[serde(rename = "webrtc")]
    WebRtc,
    /// Adaptive HTTP streaming
    #[serde(rename = "hls")]
    Hls,
    /// Low-latency adaptive HTTP streaming
    #[serde(rename = "ll-hls")]
    LlHls,
    /// Segmented adaptive streaming
    #[serde(rename = "dash")]
    Dash,
    /// Static file playback
    #[serde(rename = "vod")]
    Vod,
}

impl Technology {
    /// Identifier used in configuration and query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::WebRtc => "webrtc",
            Technology::Hls => "hls",
            Technology::LlHls => "ll-hls",
            Technology::Dash => "dash",
            Technology::Vod => "vod",
        }
    }

    /// Playlist/manifest extension for streaming technologies
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Technology::WebRtc => Some(WEBRTC_EXTENSION),
            Technology::Hls | Technology::LlHls => Some(HLS_EXTENSION),
            Technology::Dash => Some(DASH_EXTENSION),
            Technology::Vod => None,
        }
    }

    /// HTTP adaptive technologies that replay after a grace delay at end of stream
    pub fn is_http_adaptive(&self) -> bool {
        matches!(self, Technology::Hls | Technology::LlHls | Technology::Dash)
    }
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "webrtc" => Ok(Technology::WebRtc),
            "hls" => Ok(Technology::Hls),
            "ll-hls" => Ok(Technology::LlHls),
            "dash" => Ok(Technology::Dash),
            "vod" => Ok(Technology::Vod),
            other => Err(format!("unknown technology: {}", other)),
        }
    }
}

/// Adaptive HTTP streaming extension
pub const HLS_EXTENSION: &str = "m3u8";

/// Realtime transport extension
pub const WEBRTC_EXTENSION: &str = "webrtc";

/// Segmented adaptive streaming extension
pub const DASH_EXTENSION: &str = "mpd";

/// Folder holding stream resources under the application base
pub const STREAMS_FOLDER: &str = "streams";

/// Sub-folder of [`STREAMS_FOLDER`] holding low-latency playlists
pub const LL_HLS_FOLDER: &str = "ll-hls";

/// Phase of the current playback attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptPhase {
    /// Nothing attempted yet, or destroyed
    Idle,
    /// Probing or starting an engine
    Attempting {
        technology: Technology,
        stream_id: String,
    },
    /// The engine reported playback
    Playing,
    /// The attempt failed and recovery is pending or exhausted
    Failed,
}

impl AttemptPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: &AttemptPhase) -> bool {
        use AttemptPhase::*;
        matches!(
            (self, target),
            (_, Idle)
                | (_, Attempting { .. })
                | (Attempting { .. }, Playing)
                | (Attempting { .. }, Failed)
                | (Playing, Playing)
                | (Playing, Failed)
                | (Failed, Failed)
        )
    }
}

impl std::fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptPhase::Idle => write!(f, "idle"),
            AttemptPhase::Attempting { technology, stream_id } => {
                write!(f, "attempting({}, {})", technology, stream_id)
            }
            AttemptPhase::Playing => write!(f, "playing"),
            AttemptPhase::Failed => write!(f, "failed"),
        }
    }
}
