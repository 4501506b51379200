//! Adapter for the HTML media engine
//!
//! Runs realtime, adaptive HTTP and file playback. Realtime transport
//! messages arrive through the same engine and are classified here.

use super::{
    mime_for_extension, poster_for, AdapterSettings, EngineAdapter, EngineFactory, EngineKind,
    EngineSink, EngineSource, HtmlEngineEvent, InterceptMode, Interpretation, MediaEngine,
    RealtimeErrorClass, RequestInterceptor, Signal,
};
use crate::events::{PlaybackError, PlayerEvent, RealtimeInfo};
use crate::orchestrator::Message;
use crate::types::HLS_EXTENSION;
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Extensions whose `ready` event already means the surface can be shown
const SHOW_ON_READY: [&str; 3] = ["mp4", "webm", HLS_EXTENSION];

/// Containers that are accepted but rarely decodable by browsers
const POORLY_SUPPORTED: [&str; 2] = ["mov", "avi"];

pub struct HtmlAdapter {
    factory: Arc<dyn EngineFactory>,
    inbox: UnboundedSender<Message>,
    settings: AdapterSettings,
    engine: Option<Box<dyn MediaEngine>>,
    generation: u64,
    extension: String,
}

impl HtmlAdapter {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        inbox: UnboundedSender<Message>,
        settings: AdapterSettings,
    ) -> Self {
        Self {
            factory,
            inbox,
            settings,
            engine: None,
            generation: 0,
            extension: String::new(),
        }
    }

    /// Extension of the running source
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Translate a native event into a control signal and a host event.
    ///
    /// Payloads are read from the engine now, not when the event was raised.
    pub fn interpret(&mut self, event: HtmlEngineEvent) -> Interpretation {
        match event {
            HtmlEngineEvent::Ready => {
                if SHOW_ON_READY.contains(&self.extension.as_str()) {
                    Interpretation::signal(Signal::Visible)
                } else {
                    Interpretation::none()
                }
            }
            HtmlEngineEvent::Play => Interpretation::both(Signal::Started, PlayerEvent::Play),
            HtmlEngineEvent::Playing => Interpretation::relay(PlayerEvent::Playing),
            HtmlEngineEvent::Pause => Interpretation::relay(PlayerEvent::Pause),
            HtmlEngineEvent::Ended => Interpretation::both(Signal::Ended, PlayerEvent::Ended),
            HtmlEngineEvent::Error(message) => {
                warn!(message = %message, "There is an error in playback");
                Interpretation::both(
                    Signal::PlaybackFailed,
                    PlayerEvent::Error(PlaybackError {
                        technology: None,
                        message,
                    }),
                )
            }
            HtmlEngineEvent::TimeUpdate => Interpretation::relay(PlayerEvent::TimeUpdate {
                current_time: self.engine.as_ref().map_or(0.0, |e| e.current_time()),
            }),
            HtmlEngineEvent::Progress => Interpretation::relay(PlayerEvent::Progress {
                buffered_percent: self.engine.as_ref().map_or(0.0, |e| e.buffered_percent()),
            }),
            HtmlEngineEvent::VolumeChange => {
                let (volume, muted) = self
                    .engine
                    .as_ref()
                    .map_or((1.0, false), |e| (e.volume(), e.is_muted()));
                Interpretation::relay(PlayerEvent::VolumeChange { volume, muted })
            }
            HtmlEngineEvent::RateChange => Interpretation::relay(PlayerEvent::RateChange {
                playback_rate: self.engine.as_ref().map_or(1.0, |e| e.playback_rate()),
            }),
            HtmlEngineEvent::PlayRejected(rejection) => {
                Interpretation::signal(Signal::Rejected(rejection))
            }
            HtmlEngineEvent::RealtimeInfo(info) => {
                let signal = match info {
                    RealtimeInfo::IceConnectionStateChanged { state } => {
                        debug!(state = ?state, "ICE connection state changed");
                        if state.is_established() {
                            Some(Signal::Established)
                        } else if state.is_lost() {
                            Some(Signal::ConnectionLost)
                        } else {
                            None
                        }
                    }
                    RealtimeInfo::Closed => Some(Signal::ConnectionLost),
                    RealtimeInfo::ResolutionChange => Some(Signal::ResolutionChange),
                    RealtimeInfo::StreamStarted { ref stream_id } => {
                        Some(Signal::StreamStarted(stream_id.clone()))
                    }
                    RealtimeInfo::Other { .. } => None,
                };
                Interpretation {
                    signal,
                    relay: Some(PlayerEvent::RealtimeInfo(info)),
                }
            }
            HtmlEngineEvent::RealtimeError(error) => {
                let class = RealtimeErrorClass::classify(&error.code);
                warn!(code = %error.code, class = ?class, "Realtime transport error");
                Interpretation::both(
                    Signal::RealtimeFailure(class),
                    PlayerEvent::RealtimeError(error),
                )
            }
            HtmlEngineEvent::RealtimeData(data) => {
                Interpretation::relay(PlayerEvent::RealtimeData(data))
            }
            HtmlEngineEvent::MetadataCue(text) => Interpretation::relay(PlayerEvent::Metadata(text)),
        }
    }

    /// Send data over the realtime data channel of the running engine
    pub fn send_data(&mut self, data: Bytes) -> Result<()> {
        match self.engine.as_mut() {
            Some(engine) => engine.send_data(data),
            None => Err(Error::DataChannel("no engine is running".into())),
        }
    }

    /// Ask the realtime transport to report when `stream_id` goes live
    pub fn notify_when_live(&mut self, stream_id: &str) -> Result<()> {
        match self.engine.as_mut() {
            Some(engine) => engine.notify_when_live(stream_id),
            None => Err(Error::engine("no engine is running")),
        }
    }
}

impl EngineAdapter for HtmlAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Html
    }

    fn start(&mut self, request: super::StartRequest<'_>) -> Result<bool> {
        self.stop();

        let Some(mime_type) = mime_for_extension(request.extension) else {
            warn!(extension = %request.extension, "Unsupported extension, nothing to play");
            return Ok(false);
        };
        if POORLY_SUPPORTED.contains(&request.extension) {
            warn!(
                extension = %request.extension,
                "Browsers may not support playing this format"
            );
        }

        let is_playlist = request.extension == HLS_EXTENSION;
        let source = EngineSource {
            url: request.url.to_string(),
            mime_type,
            extension: request.extension.to_string(),
            muted: request.muted,
            autoplay: self.settings.autoplay,
            poster: Some(poster_for(request.stream_id)),
            live_ui: is_playlist,
            with_credentials: self.settings.with_credentials,
            ice_servers: self.settings.ice_servers.clone(),
            reconnect: false,
            live: None,
            interceptor: is_playlist.then(|| {
                RequestInterceptor::new(self.settings.security.clone(), InterceptMode::PerKey)
            }),
        };

        let sink = EngineSink::new(request.generation, self.inbox.clone());
        let mut engine = self.factory.create(EngineKind::Html, sink)?;
        if let Err(e) = engine.load(&source) {
            engine.dispose();
            return Err(e);
        }
        if self.settings.autoplay {
            engine.play();
        }

        info!(url = %request.url, mime = mime_type, "HTML engine started");
        self.engine = Some(engine);
        self.generation = request.generation;
        self.extension = request.extension.to_string();
        Ok(true)
    }

    fn stop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!(generation = self.generation, "Disposing HTML engine");
            engine.dispose();
        }
        self.extension.clear();
    }

    fn is_active(&self) -> bool {
        self.engine.is_some()
    }

    fn accepts(&self, generation: u64) -> bool {
        self.engine.is_some() && self.generation == generation
    }

    fn play(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.play();
        }
    }

    fn pause(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
    }

    fn set_muted(&mut self, muted: bool) {
        if let Some(engine) = self.engine.as_mut() {
            engine.set_muted(muted);
        }
    }

    fn is_muted(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_muted())
    }

    fn current_time(&self) -> Option<f64> {
        self.engine.as_ref().map(|e| e.current_time())
    }

    fn current_source(&self) -> Option<String> {
        self.engine.as_ref().and_then(|e| e.current_source())
    }
}

impl std::fmt::Debug for HtmlAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlAdapter")
            .field("active", &self.engine.is_some())
            .field("generation", &self.generation)
            .field("extension", &self.extension)
            .finish()
    }
}
