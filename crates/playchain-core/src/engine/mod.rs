//! Engine boundary and adapters
//!
//! The two media engines live outside this crate. Hosts hand in an
//! [`EngineFactory`]; every `start` builds a fresh [`MediaEngine`] whose
//! native events flow back through an [`EngineSink`] into the orchestrator
//! inbox, stamped with the attempt generation that created the engine.
//!
//! ```text
//!   host engine ──native event──▶ EngineSink ──▶ orchestrator inbox
//!                                                   │
//!                         adapter.interpret() ◀─────┘
//!                           │            │
//!                     Signal (control)  PlayerEvent (relay to host)
//! ```

pub mod dash;
pub mod html;
mod mime;

pub use dash::DashAdapter;
pub use html::HtmlAdapter;
pub use mime::mime_for_extension;

use crate::config::{PlaybackConfig, SecurityParams};
use crate::events::{PlayerEvent, RealtimeError, RealtimeInfo};
use crate::orchestrator::Message;
use crate::{Error, Result};
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

/// Engine implementation a technology runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// HTML media engine: realtime, adaptive HTTP and file playback
    Html,
    /// Segmented adaptive streaming engine
    Dash,
}

/// Why an engine refused to start playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayRejection {
    /// Autoplay policy blocked playback with audio
    NotAllowed,
    Other(String),
}

/// Native events of the HTML engine
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlEngineEvent {
    Ready,
    Play,
    Playing,
    Pause,
    Ended,
    Error(String),
    TimeUpdate,
    Progress,
    VolumeChange,
    RateChange,
    /// The play request was rejected
    PlayRejected(PlayRejection),
    RealtimeInfo(RealtimeInfo),
    RealtimeError(RealtimeError),
    RealtimeData(Bytes),
    /// Text of the active timed-metadata cue
    MetadataCue(String),
}

/// Native events of the segmented streaming engine
#[derive(Debug, Clone, PartialEq)]
pub enum DashEngineEvent {
    StreamInitialized,
    PlaybackPlaying,
    PlaybackEnded,
    PlaybackError(String),
    Error(String),
    PlaybackPaused,
    PlaybackSeeked,
    PlaybackTimeUpdated,
    PlaybackNotAllowed,
}

/// Native event from either engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Html(HtmlEngineEvent),
    Dash(DashEngineEvent),
}

impl From<HtmlEngineEvent> for EngineEvent {
    fn from(event: HtmlEngineEvent) -> Self {
        EngineEvent::Html(event)
    }
}

impl From<DashEngineEvent> for EngineEvent {
    fn from(event: DashEngineEvent) -> Self {
        EngineEvent::Dash(event)
    }
}

/// Channel an engine reports its native events through
#[derive(Debug, Clone)]
pub struct EngineSink {
    generation: u64,
    tx: UnboundedSender<Message>,
}

impl EngineSink {
    pub(crate) fn new(generation: u64, tx: UnboundedSender<Message>) -> Self {
        Self { generation, tx }
    }

    /// Attempt generation the engine was created for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report a native event. Events sent after the player is gone are dropped.
    pub fn emit<E: Into<EngineEvent>>(&self, event: E) {
        let _ = self.tx.send(Message::Engine {
            generation: self.generation,
            event: event.into(),
        });
    }
}

/// How security parameters are added to engine sub-requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptMode {
    /// Add each parameter the URI is missing
    PerKey,
    /// Add the whole query unless the URI already contains it
    Whole,
}

/// Rewrites every HTTP request an engine issues, including playlist reloads
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    params: SecurityParams,
    mode: InterceptMode,
}

impl RequestInterceptor {
    pub fn new(params: SecurityParams, mode: InterceptMode) -> Self {
        Self { params, mode }
    }

    pub fn intercept(&self, uri: &str) -> String {
        match self.mode {
            InterceptMode::PerKey => self.params.inject_missing(uri),
            InterceptMode::Whole => self.params.inject_whole(uri),
        }
    }
}

/// Live catch-up settings for the segmented engine
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSettings {
    /// Target live delay in seconds
    pub target_latency: f64,
    /// Drift in seconds tolerated before catching up
    pub max_drift: f64,
    /// Maximum playback-rate change while catching up
    pub catchup_playback_rate: f64,
    /// Latency in seconds beyond which catch-up is abandoned
    pub latency_threshold: f64,
}

impl LiveSettings {
    pub fn with_target(target_latency: f64) -> Self {
        Self {
            target_latency,
            max_drift: 0.5,
            catchup_playback_rate: 0.5,
            latency_threshold: 60.0,
        }
    }
}

/// Everything an engine needs to start a source
#[derive(Debug, Clone)]
pub struct EngineSource {
    pub url: String,
    pub mime_type: &'static str,
    pub extension: String,
    pub muted: bool,
    pub autoplay: bool,
    /// Preview image shown before the first frame
    pub poster: Option<String>,
    /// Show the live UI (adaptive HTTP playlists)
    pub live_ui: bool,
    pub with_credentials: bool,
    /// ICE server list for the realtime transport
    pub ice_servers: String,
    /// Engine-side reconnects; recovery is driven by the orchestrator instead
    pub reconnect: bool,
    pub live: Option<LiveSettings>,
    pub interceptor: Option<RequestInterceptor>,
}

/// A media engine instance provided by the host
pub trait MediaEngine: Send {
    /// Attach a source. Playback starts only on [`MediaEngine::play`] unless
    /// the engine honours `source.autoplay` itself.
    fn load(&mut self, source: &EngineSource) -> Result<()>;

    /// Request playback. A rejection is reported as a native event.
    fn play(&mut self);

    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    fn current_time(&self) -> f64;

    fn current_source(&self) -> Option<String>;

    fn buffered_percent(&self) -> f64 {
        0.0
    }

    fn volume(&self) -> f64 {
        1.0
    }

    fn playback_rate(&self) -> f64 {
        1.0
    }

    /// Current live latency in seconds, if the engine measures it
    fn live_latency(&self) -> Option<f64> {
        None
    }

    /// Send data over the realtime data channel
    fn send_data(&mut self, _data: Bytes) -> Result<()> {
        Err(Error::DataChannel("engine has no data channel".into()))
    }

    /// Ask the realtime transport to report when `stream_id` goes live
    fn notify_when_live(&mut self, _stream_id: &str) -> Result<()> {
        Err(Error::engine("engine cannot wait for streams"))
    }

    /// Release the engine. No events may be emitted afterwards.
    fn dispose(&mut self);
}

/// Host-provided constructor for engine instances
pub trait EngineFactory: Send + Sync {
    fn create(&self, kind: EngineKind, sink: EngineSink) -> Result<Box<dyn MediaEngine>>;
}

/// Class of a realtime transport error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeErrorClass {
    /// The stream is not live yet
    LivenessWait,
    /// Resource, auth or capacity problem: give up on this attempt
    FatalForAttempt,
    /// Codec negotiation failed: use adaptive HTTP instead
    CodecIncompatible,
    /// Informational only
    Other,
}

impl RealtimeErrorClass {
    pub fn classify(code: &str) -> Self {
        match code {
            "no_stream_exist" => RealtimeErrorClass::LivenessWait,
            "WebSocketNotConnected"
            | "not_initialized_yet"
            | "data_store_not_available"
            | "highResourceUsage"
            | "unauthorized_access"
            | "user_blocked" => RealtimeErrorClass::FatalForAttempt,
            "notSetRemoteDescription" => RealtimeErrorClass::CodecIncompatible,
            _ => RealtimeErrorClass::Other,
        }
    }
}

/// Control signal an adapter derives from a native event
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// The surface may be shown
    Visible,
    /// Playback started
    Started,
    Ended,
    /// Generic playback or decode error
    PlaybackFailed,
    Rejected(PlayRejection),
    /// Realtime connection reached connected/completed
    Established,
    /// Realtime connection or signalling socket lost
    ConnectionLost,
    /// Publisher resolution change in progress
    ResolutionChange,
    /// A waited-for stream went live
    StreamStarted(String),
    RealtimeFailure(RealtimeErrorClass),
}

/// What a native event means to the orchestrator and to the host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    pub signal: Option<Signal>,
    pub relay: Option<PlayerEvent>,
}

impl Interpretation {
    fn none() -> Self {
        Self::default()
    }

    fn relay(event: PlayerEvent) -> Self {
        Self {
            signal: None,
            relay: Some(event),
        }
    }

    fn signal(signal: Signal) -> Self {
        Self {
            signal: Some(signal),
            relay: None,
        }
    }

    fn both(signal: Signal, event: PlayerEvent) -> Self {
        Self {
            signal: Some(signal),
            relay: Some(event),
        }
    }
}

/// Configuration shared by both adapters
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub autoplay: bool,
    pub with_credentials: bool,
    pub ice_servers: String,
    pub security: SecurityParams,
    pub target_latency: f64,
}

impl AdapterSettings {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            autoplay: config.autoplay,
            with_credentials: config.with_credentials,
            ice_servers: config.ice_servers.clone(),
            security: config.security.clone(),
            target_latency: config.target_latency,
        }
    }
}

/// Parameters of one engine start
#[derive(Debug, Clone)]
pub struct StartRequest<'a> {
    pub url: &'a str,
    pub extension: &'a str,
    pub stream_id: &'a str,
    pub generation: u64,
    pub muted: bool,
}

/// Uniform command surface over an engine
pub trait EngineAdapter {
    fn kind(&self) -> EngineKind;

    /// Dispose any running engine and start a fresh one.
    ///
    /// Returns `Ok(false)` when the extension is unknown and nothing was started.
    fn start(&mut self, request: StartRequest<'_>) -> Result<bool>;

    /// Dispose the running engine, if any
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// True when an event stamped with `generation` comes from the live engine
    fn accepts(&self, generation: u64) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    fn current_time(&self) -> Option<f64>;

    fn current_source(&self) -> Option<String>;
}

/// Preview image of a stream, without the adaptive suffix
pub fn poster_for(stream_id: &str) -> String {
    let preview = match stream_id.find("_adaptive") {
        Some(idx) => &stream_id[..idx],
        None => stream_id,
    };
    format!("previews/{}.png", preview)
}
