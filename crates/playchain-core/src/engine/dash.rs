//! Adapter for the segmented streaming engine

use super::{
    mime_for_extension, poster_for, AdapterSettings, DashEngineEvent, EngineAdapter,
    EngineFactory, EngineKind, EngineSink, EngineSource, InterceptMode, Interpretation,
    LiveSettings, MediaEngine, PlayRejection, RequestInterceptor, Signal, StartRequest,
};
use crate::events::{PlaybackError, PlayerEvent};
use crate::orchestrator::Message;
use crate::types::{Technology, DASH_EXTENSION};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Period of live-latency sampling while the engine runs
pub const LATENCY_SAMPLE_PERIOD: Duration = Duration::from_secs(2);

pub struct DashAdapter {
    factory: Arc<dyn EngineFactory>,
    inbox: UnboundedSender<Message>,
    settings: AdapterSettings,
    engine: Option<Box<dyn MediaEngine>>,
    generation: u64,
    latency_timer: Option<JoinHandle<()>>,
}

impl DashAdapter {
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
            latency_timer: None,
        }
    }

    /// Translate a native event into a control signal and a host event
    pub fn interpret(&mut self, event: DashEngineEvent) -> Interpretation {
        match event {
            DashEngineEvent::StreamInitialized => Interpretation::signal(Signal::Visible),
            DashEngineEvent::PlaybackPlaying => {
                Interpretation::both(Signal::Started, PlayerEvent::Play)
            }
            DashEngineEvent::PlaybackEnded => {
                Interpretation::both(Signal::Ended, PlayerEvent::Ended)
            }
            DashEngineEvent::PlaybackError(message) | DashEngineEvent::Error(message) => {
                warn!(message = %message, "There is an error in dash playback");
                Interpretation::both(
                    Signal::PlaybackFailed,
                    PlayerEvent::Error(PlaybackError {
                        technology: Some(Technology::Dash),
                        message,
                    }),
                )
            }
            DashEngineEvent::PlaybackPaused => Interpretation::relay(PlayerEvent::Pause),
            DashEngineEvent::PlaybackSeeked => Interpretation::relay(PlayerEvent::Seeked),
            DashEngineEvent::PlaybackTimeUpdated => {
                Interpretation::relay(PlayerEvent::TimeUpdate {
                    current_time: self.engine.as_ref().map_or(0.0, |e| e.current_time()),
                })
            }
            DashEngineEvent::PlaybackNotAllowed => {
                Interpretation::signal(Signal::Rejected(PlayRejection::NotAllowed))
            }
        }
    }

    /// Log the current live latency. Samples from a previous engine are ignored.
    pub fn sample_latency(&self, generation: u64) {
        if !self.accepts(generation) {
            return;
        }
        if let Some(latency) = self.engine.as_ref().and_then(|e| e.live_latency()) {
            debug!(latency, "Dash live latency");
        }
    }

    fn start_latency_timer(&mut self, generation: u64) {
        let inbox = self.inbox.clone();
        self.latency_timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(
                Instant::now() + LATENCY_SAMPLE_PERIOD,
                LATENCY_SAMPLE_PERIOD,
            );
            loop {
                ticker.tick().await;
                if inbox.send(Message::LatencySample { generation }).is_err() {
                    break;
                }
            }
        }));
    }
}

impl EngineAdapter for DashAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Dash
    }

    fn start(&mut self, request: StartRequest<'_>) -> Result<bool> {
        self.stop();

        let mime_type = mime_for_extension(DASH_EXTENSION).unwrap_or("application/dash+xml");
        let source = EngineSource {
            url: request.url.to_string(),
            mime_type,
            extension: request.extension.to_string(),
            muted: request.muted,
            autoplay: self.settings.autoplay,
            poster: Some(poster_for(request.stream_id)),
            live_ui: false,
            with_credentials: self.settings.with_credentials,
            ice_servers: self.settings.ice_servers.clone(),
            reconnect: false,
            live: Some(LiveSettings::with_target(self.settings.target_latency)),
            interceptor: Some(RequestInterceptor::new(
                self.settings.security.clone(),
                InterceptMode::Whole,
            )),
        };

        let sink = EngineSink::new(request.generation, self.inbox.clone());
        let mut engine = self.factory.create(EngineKind::Dash, sink)?;
        if let Err(e) = engine.load(&source) {
            engine.dispose();
            return Err(e);
        }

        info!(
            url = %request.url,
            target_latency = self.settings.target_latency,
            "Dash engine started"
        );
        self.engine = Some(engine);
        self.generation = request.generation;
        self.start_latency_timer(request.generation);
        Ok(true)
    }

    fn stop(&mut self) {
        if let Some(timer) = self.latency_timer.take() {
            timer.abort();
        }
        if let Some(mut engine) = self.engine.take() {
            debug!(generation = self.generation, "Disposing dash engine");
            engine.dispose();
        }
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

impl Drop for DashAdapter {
    fn drop(&mut self) {
        if let Some(timer) = self.latency_timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for DashAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashAdapter")
            .field("active", &self.engine.is_some())
            .field("generation", &self.generation)
            .finish()
    }
}
