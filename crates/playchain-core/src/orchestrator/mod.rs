//! Playback orchestration
//!
//! A single task owns all playback state and reacts to one message at a time:
//! host commands, native engine events, probe results and timer firings. Every
//! attempt bumps a generation; probe results and engine events from older
//! attempts are discarded, and cancelled timers are recognised by token.
//!
//! ```text
//!            play()
//!              │
//!              ▼
//!   ┌──▶ play_if_exists(tech, stream) ──probe──▶ start engine ──▶ playing
//!   │          ▲                                     │
//!   │          │ retry (3 s)                         │ error / lost / ended
//!   │          │                                     ▼
//!   │     try_next_tech ◀──────────────────── classify failure
//!   │                                                │
//!   └──────────── backup tick (2 s, bounded) ◀───────┘ stream not live yet
//! ```

mod message;
mod state;
mod timer;

pub use message::{Command, Message, ProbeReport, ResolvedResource, TimerKind};
pub use state::{FallbackState, VodPlan};

use crate::config::PlaybackConfig;
use crate::engine::{
    AdapterSettings, DashAdapter, EngineAdapter, EngineEvent, EngineFactory, EngineKind,
    HtmlAdapter, PlayRejection, RealtimeErrorClass, Signal, StartRequest,
};
use crate::events::{EventBus, PlayerEvent};
use crate::probe::{ll_hls_folder, ExistenceCheck, ResourceProber};
use crate::types::{
    AttemptPhase, Technology, DASH_EXTENSION, HLS_EXTENSION, STREAMS_FOLDER, WEBRTC_EXTENSION,
};
use crate::visibility::VisibilityController;
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use timer::TimerSlot;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

/// Delay before the next technology is tried
pub const TRY_NEXT_TECH_DELAY: Duration = Duration::from_millis(3000);

/// Window in which repeated generic engine errors count once
pub const ERROR_DEBOUNCE: Duration = Duration::from_millis(2500);

/// Period of backup stream attempts
pub const BACKUP_STREAM_RETRY_PERIOD: Duration = Duration::from_millis(2000);

/// Delay before an ended adaptive HTTP stream is replayed on the same technology
pub const END_OF_STREAM_REPLAY_DELAY: Duration = Duration::from_secs(10);

/// Pause length while the publisher changes resolution
pub const RESOLUTION_CHANGE_RESUME_DELAY: Duration = Duration::from_secs(2);

/// Whether the task keeps running after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct Orchestrator {
    config: Arc<PlaybackConfig>,
    prober: ResourceProber,
    html: HtmlAdapter,
    dash: DashAdapter,
    visibility: VisibilityController,
    bus: EventBus,
    inbox: UnboundedSender<Message>,
    state: FallbackState,
    retry: TimerSlot,
    error_debounce: TimerSlot,
    replay: TimerSlot,
    resolution_resume: TimerSlot,
    backup: TimerSlot,
    next_token: u64,
    phase_tx: watch::Sender<AttemptPhase>,
}

impl Orchestrator {
    /// Build an orchestrator posting its own timers and probe results to `inbox`
    pub fn new(
        config: Arc<PlaybackConfig>,
        engines: Arc<dyn EngineFactory>,
        check: Arc<dyn ExistenceCheck>,
        visibility: VisibilityController,
        inbox: UnboundedSender<Message>,
    ) -> Self {
        let settings = AdapterSettings::from_config(&config);
        let prober = ResourceProber::new(
            config.http_base_url.clone(),
            config.security.clone(),
            check,
        );

        Self {
            prober,
            html: HtmlAdapter::new(engines.clone(), inbox.clone(), settings.clone()),
            dash: DashAdapter::new(engines, inbox.clone(), settings),
            visibility,
            bus: EventBus::new(),
            inbox,
            state: FallbackState::new(&config),
            retry: TimerSlot::new(TimerKind::Retry),
            error_debounce: TimerSlot::new(TimerKind::ErrorDebounce),
            replay: TimerSlot::new(TimerKind::Replay),
            resolution_resume: TimerSlot::new(TimerKind::ResolutionResume),
            backup: TimerSlot::new(TimerKind::BackupTick),
            next_token: 0,
            phase_tx: watch::channel(AttemptPhase::Idle).0,
            config,
        }
    }

    /// Process messages until the player is destroyed or every sender is gone
    pub async fn run(mut self, mut inbox: UnboundedReceiver<Message>) {
        while let Some(message) = inbox.recv().await {
            if self.handle(message) == Flow::Stop {
                break;
            }
        }
        debug!("Orchestrator stopped");
    }

    /// React to one message
    pub fn handle(&mut self, message: Message) -> Flow {
        trace!(message = ?message, "Handling message");
        match message {
            Message::Command(command) => {
                let flow = self.on_command(command);
                self.publish_phase();
                return flow;
            }
            Message::Engine { generation, event } => self.on_engine(generation, event),
            Message::Probe(report) => self.on_probe(report),
            Message::Timer { kind, token } => self.on_timer(kind, token),
            Message::LatencySample { generation } => self.dash.sample_latency(generation),
        }
        self.publish_phase();
        Flow::Continue
    }

    /// Observe phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<AttemptPhase> {
        self.phase_tx.subscribe()
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn state(&self) -> &FallbackState {
        &self.state
    }

    pub fn phase(&self) -> AttemptPhase {
        self.state.phase.clone()
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    /// A move to the next technology is scheduled
    pub fn is_retry_pending(&self) -> bool {
        self.retry.is_pending()
    }

    pub fn is_backup_interval_running(&self) -> bool {
        self.backup.is_pending()
    }

    /// Start from the head of the play order on the primary stream
    pub fn play(&mut self) {
        self.cancel_timers();
        self.state.reset(&self.config);

        if self.config.is_direct_path() {
            self.play_direct();
            return;
        }

        let technology = self
            .config
            .play_order
            .first()
            .copied()
            .unwrap_or(Technology::WebRtc);
        let stream_id = self.config.stream_id.clone();
        self.play_if_exists(technology, &stream_id);
    }

    /// Stop everything. Pending timers and in-flight results become no-ops.
    pub fn destroy(&mut self) {
        self.cancel_timers();
        self.stop_engines();
        self.visibility.set_player_visible(false);
        self.state.generation += 1;
        self.state.set_phase(AttemptPhase::Idle);
        info!("Player destroyed");
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.state.muted = muted;
        self.html.set_muted(muted);
        self.dash.set_muted(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.state.muted
    }

    /// URL of the playing source
    pub fn source(&self) -> Option<String> {
        self.active().and_then(|adapter| adapter.current_source())
    }

    /// Playback position in seconds
    pub fn time(&self) -> Option<f64> {
        self.active().and_then(|adapter| adapter.current_time())
    }

    /// Send data over the realtime data channel
    pub fn send_data(&mut self, data: Bytes) -> bool {
        if self.state.current_technology != Some(Technology::WebRtc) || !self.html.is_active() {
            warn!("Player is not ready or playType is not WebRTC");
            return false;
        }
        match self.html.send_data(data) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Data could not be sent");
                false
            }
        }
    }

    fn on_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Play => self.play(),
            Command::Destroy => {
                self.destroy();
                return Flow::Stop;
            }
            Command::SetMuted(muted) => self.set_muted(muted),
            Command::IsMuted(reply) => {
                let _ = reply.send(self.is_muted());
            }
            Command::Source(reply) => {
                let _ = reply.send(self.source());
            }
            Command::Time(reply) => {
                let _ = reply.send(self.time());
            }
            Command::SendData(data, reply) => {
                let sent = self.send_data(data);
                let _ = reply.send(sent);
            }
            Command::SetPlayerListener(listener) => self.bus.set_player_listener(listener),
            Command::SetDataListener(listener) => self.bus.set_data_listener(listener),
            Command::SetMetadataListener(listener) => self.bus.set_metadata_listener(listener),
        }
        Flow::Continue
    }

    fn play_direct(&mut self) {
        let stream_id = self.config.stream_id.clone();
        let extension = stream_id
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        let kind = if extension == DASH_EXTENSION {
            EngineKind::Dash
        } else {
            EngineKind::Html
        };

        self.stop_engines();
        self.visibility.set_player_visible(false);
        self.state
            .begin_attempt(&self.config, Technology::Vod, &stream_id);
        let url = self.config.direct_url();
        info!(url = %url, "Playing direct stream path");
        self.start_engine(kind, &url, &extension, &stream_id);
    }

    /// Start an attempt of `technology` on `stream_id`, probing first where needed
    fn play_if_exists(&mut self, technology: Technology, stream_id: &str) {
        self.replay.cancel();
        self.resolution_resume.cancel();
        self.error_debounce.cancel();
        self.stop_engines();
        self.visibility.set_player_visible(false);

        let generation = self
            .state
            .begin_attempt(&self.config, technology, stream_id);
        info!(technology = %technology, stream_id = %stream_id, generation, "Trying to play");

        match technology {
            Technology::WebRtc => {
                let url = self.config.realtime_url(stream_id);
                self.start_engine(EngineKind::Html, &url, WEBRTC_EXTENSION, stream_id);
            }
            _ => self.spawn_probe(generation, technology, stream_id),
        }
    }

    fn spawn_probe(&self, generation: u64, technology: Technology, stream_id: &str) {
        let prober = self.prober.clone();
        let inbox = self.inbox.clone();
        let play_types = self.config.play_types.clone();
        let stream_id = stream_id.to_string();

        tokio::spawn(async move {
            let outcome = resolve_resource(&prober, technology, &stream_id, &play_types).await;
            let _ = inbox.send(Message::Probe(ProbeReport {
                generation,
                technology,
                stream_id,
                outcome,
            }));
        });
    }

    fn on_probe(&mut self, report: ProbeReport) {
        if report.generation != self.state.generation
            || self.state.current_technology != Some(report.technology)
            || self.state.active_stream_id != report.stream_id
        {
            debug!(
                generation = report.generation,
                technology = %report.technology,
                stream_id = %report.stream_id,
                "Discarding stale probe result"
            );
            return;
        }

        match report.outcome {
            Ok(resource) => {
                let kind = if report.technology == Technology::Dash {
                    EngineKind::Dash
                } else {
                    EngineKind::Html
                };
                self.start_engine(kind, &resource.url, &resource.extension, &report.stream_id);
            }
            Err(e) => {
                self.state.set_phase(AttemptPhase::Failed);
                match report.technology {
                    Technology::Vod => {
                        warn!(stream_id = %report.stream_id, error = %e, "No file to play");
                    }
                    Technology::Hls | Technology::LlHls
                        if self.state.is_backup_stream_enabled(&self.config) =>
                    {
                        self.start_backup_interval();
                    }
                    _ => self.try_next_tech(),
                }
            }
        }
    }

    fn start_engine(&mut self, kind: EngineKind, url: &str, extension: &str, stream_id: &str) {
        let request = StartRequest {
            url,
            extension,
            stream_id,
            generation: self.state.generation,
            muted: self.state.muted,
        };
        let started = match kind {
            EngineKind::Html => self.html.start(request),
            EngineKind::Dash => self.dash.start(request),
        };

        match started {
            Ok(true) => {}
            Ok(false) => self.state.set_phase(AttemptPhase::Failed),
            Err(e) => {
                error!(error = %e, engine = ?kind, "Engine could not be started");
                self.try_next_tech();
            }
        }
    }

    /// Schedule the next (technology, stream) pair. Only one move can be pending.
    fn try_next_tech(&mut self) {
        if self.retry.is_pending() {
            debug!("tryNextTech is already scheduled no need to schedule again");
            return;
        }

        self.backup.cancel();
        self.stop_engines();
        self.visibility.set_player_visible(false);
        self.state.set_phase(AttemptPhase::Failed);

        let (technology, stream_id) = self.state.advance(&self.config);
        let token = self.token();
        self.retry
            .schedule(token, TRY_NEXT_TECH_DELAY, self.inbox.clone());
        info!(
            technology = %technology,
            stream_id = %stream_id,
            delay = ?TRY_NEXT_TECH_DELAY,
            "Next attempt scheduled"
        );
    }

    fn start_backup_interval(&mut self) {
        if self.backup.is_pending() {
            return;
        }
        info!(
            backup_stream_id = ?self.config.backup_stream_id,
            "Trying backup stream periodically"
        );
        let token = self.token();
        self.backup
            .schedule_every(token, BACKUP_STREAM_RETRY_PERIOD, self.inbox.clone());
    }

    fn on_backup_tick(&mut self) {
        if self.state.backup_try_count >= self.config.max_backup_try_count {
            info!(
                tries = self.state.backup_try_count,
                "Backup stream tries exhausted"
            );
            self.backup.cancel();
            self.try_next_tech();
            return;
        }

        let Some(backup) = self.config.backup_stream_id.clone() else {
            self.backup.cancel();
            return;
        };
        self.state.backup_try_count += 1;
        let technology = self
            .state
            .current_technology
            .or_else(|| self.config.play_order.first().copied())
            .unwrap_or(Technology::WebRtc);
        self.play_if_exists(technology, &backup);
    }

    fn on_timer(&mut self, kind: TimerKind, token: u64) {
        match kind {
            TimerKind::Retry => {
                if self.retry.fire(token) {
                    let (technology, stream_id) = self.state.target(&self.config);
                    self.play_if_exists(technology, &stream_id);
                    return;
                }
            }
            TimerKind::ErrorDebounce => {
                if self.error_debounce.fire(token) {
                    self.state.error_already_handled = false;
                    self.try_next_tech();
                    return;
                }
            }
            TimerKind::Replay => {
                if self.replay.fire(token) {
                    let technology = self.head_technology();
                    let stream_id = self.state.active_stream_id.clone();
                    self.play_if_exists(technology, &stream_id);
                    return;
                }
            }
            TimerKind::ResolutionResume => {
                if self.resolution_resume.fire(token) {
                    if let Some(adapter) = self.active_mut() {
                        adapter.play();
                    }
                    return;
                }
            }
            TimerKind::BackupTick => {
                if self.backup.is_current(token) {
                    self.on_backup_tick();
                    return;
                }
            }
        }
        trace!(kind = ?kind, token, "Ignoring cancelled timer");
    }

    fn on_engine(&mut self, generation: u64, event: EngineEvent) {
        let interpretation = match event {
            EngineEvent::Html(event) => {
                if !self.html.accepts(generation) {
                    trace!(generation, "Ignoring event from a disposed HTML engine");
                    return;
                }
                self.html.interpret(event)
            }
            EngineEvent::Dash(event) => {
                if !self.dash.accepts(generation) {
                    trace!(generation, "Ignoring event from a disposed dash engine");
                    return;
                }
                self.dash.interpret(event)
            }
        };

        let mut relay = interpretation.relay;
        if let Some(PlayerEvent::Error(ref mut payload)) = relay {
            payload.technology = self.state.current_technology;
        }
        if let Some(signal) = interpretation.signal {
            self.on_signal(signal);
        }
        if let Some(event) = relay {
            self.bus.dispatch(event);
        }
    }

    fn on_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Visible => self.visibility.set_player_visible(true),
            Signal::Started => {
                self.visibility.set_player_visible(true);
                self.state.set_phase(AttemptPhase::Playing);
                if self.backup.is_pending() {
                    self.backup.cancel();
                    self.state.backup_try_count = 0;
                }
            }
            Signal::Ended => self.on_ended(),
            Signal::PlaybackFailed => self.on_playback_failed(),
            Signal::Rejected(rejection) => self.on_play_rejected(rejection),
            Signal::Established => {
                info!("ICE connection established");
                self.state.ice_connected = true;
                self.state.backup_try_count = 0;
                self.backup.cancel();
            }
            Signal::ConnectionLost => {
                warn!("Realtime connection lost");
                self.try_next_tech();
            }
            Signal::ResolutionChange => {
                info!("Resolution change in progress, pausing");
                if let Some(adapter) = self.active_mut() {
                    adapter.pause();
                }
                let token = self.token();
                self.resolution_resume.schedule(
                    token,
                    RESOLUTION_CHANGE_RESUME_DELAY,
                    self.inbox.clone(),
                );
            }
            Signal::StreamStarted(stream_id) => self.on_stream_started(stream_id),
            Signal::RealtimeFailure(class) => self.on_realtime_failure(class),
        }
    }

    fn on_ended(&mut self) {
        self.visibility.set_player_visible(false);
        let Some(technology) = self.state.current_technology else {
            return;
        };

        if technology == Technology::Vod {
            info!("File playback ended");
            return;
        }

        let stream_id = self.state.active_stream_id.clone();
        if self.state.ice_connected {
            info!(stream_id = %stream_id, "Stream ended after connecting, restarting");
            self.play_if_exists(technology, &stream_id);
        } else if technology.is_http_adaptive() {
            let head = self.head_technology();
            if head == technology {
                info!(
                    delay = ?END_OF_STREAM_REPLAY_DELAY,
                    "Stream ended, replaying later"
                );
                self.stop_engines();
                let token = self.token();
                self.replay
                    .schedule(token, END_OF_STREAM_REPLAY_DELAY, self.inbox.clone());
            } else {
                self.play_if_exists(head, &stream_id);
            }
        } else {
            self.try_next_tech();
        }
    }

    fn on_playback_failed(&mut self) {
        if self.state.error_already_handled {
            debug!("Error is already being handled");
            return;
        }
        self.state.error_already_handled = true;
        let token = self.token();
        self.error_debounce
            .schedule(token, ERROR_DEBOUNCE, self.inbox.clone());
    }

    fn on_play_rejected(&mut self, rejection: PlayRejection) {
        match rejection {
            PlayRejection::NotAllowed
                if !self.config.force_play_with_audio && !self.state.muted_retry_done =>
            {
                info!("Autoplay with audio was blocked, trying muted");
                self.state.muted_retry_done = true;
                if let Some(adapter) = self.active_mut() {
                    adapter.set_muted(true);
                    adapter.play();
                }
            }
            PlayRejection::NotAllowed => {
                warn!("Autoplay with audio was blocked and will not be retried");
            }
            PlayRejection::Other(reason) => warn!(reason = %reason, "Play request rejected"),
        }
    }

    fn on_stream_started(&mut self, stream_id: String) {
        let known = stream_id == self.config.stream_id
            || self.config.backup_stream_id.as_deref() == Some(stream_id.as_str());
        if !known {
            warn!(stream_id = %stream_id, "Ignoring start of an unknown stream");
            return;
        }

        info!(stream_id = %stream_id, "Stream started, playing");
        let technology = self
            .state
            .current_technology
            .unwrap_or(Technology::WebRtc);
        self.play_if_exists(technology, &stream_id);
    }

    fn on_realtime_failure(&mut self, class: RealtimeErrorClass) {
        match class {
            RealtimeErrorClass::LivenessWait => {
                if self.state.is_backup_stream_enabled(&self.config) {
                    self.start_backup_interval();
                } else if self.config.play_order.len() == 1 {
                    let stream_id = self.state.active_stream_id.clone();
                    match self.html.notify_when_live(&stream_id) {
                        Ok(()) => info!(stream_id = %stream_id, "Waiting for stream to start"),
                        Err(e) => {
                            warn!(error = %e, "Cannot wait for stream to start");
                            self.try_next_tech();
                        }
                    }
                } else {
                    self.try_next_tech();
                }
            }
            RealtimeErrorClass::FatalForAttempt => self.try_next_tech(),
            RealtimeErrorClass::CodecIncompatible => {
                info!("Codec is not supported by the realtime transport, switching to HLS");
                let stream_id = self.state.active_stream_id.clone();
                self.play_if_exists(Technology::Hls, &stream_id);
            }
            RealtimeErrorClass::Other => {}
        }
    }

    fn head_technology(&self) -> Technology {
        self.config
            .play_order
            .first()
            .copied()
            .unwrap_or(Technology::WebRtc)
    }

    fn active(&self) -> Option<&dyn EngineAdapter> {
        if self.dash.is_active() {
            Some(&self.dash as &dyn EngineAdapter)
        } else if self.html.is_active() {
            Some(&self.html as &dyn EngineAdapter)
        } else {
            None
        }
    }

    fn active_mut(&mut self) -> Option<&mut dyn EngineAdapter> {
        if self.dash.is_active() {
            Some(&mut self.dash as &mut dyn EngineAdapter)
        } else if self.html.is_active() {
            Some(&mut self.html as &mut dyn EngineAdapter)
        } else {
            None
        }
    }

    fn stop_engines(&mut self) {
        self.html.stop();
        self.dash.stop();
    }

    fn cancel_timers(&mut self) {
        self.retry.cancel();
        self.error_debounce.cancel();
        self.replay.cancel();
        self.resolution_resume.cancel();
        self.backup.cancel();
    }

    fn publish_phase(&self) {
        let phase = &self.state.phase;
        self.phase_tx.send_if_modified(|current| {
            if current != phase {
                *current = phase.clone();
                true
            } else {
                false
            }
        });
    }

    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

/// Probe the resource of a technology and pick the extension to play it with
pub async fn resolve_resource(
    prober: &ResourceProber,
    technology: Technology,
    stream_id: &str,
    play_types: &[String],
) -> Result<ResolvedResource> {
    let found = |url: String, extension: &str| ResolvedResource {
        url,
        extension: extension.to_string(),
    };

    match technology {
        Technology::Hls => prober
            .probe(STREAMS_FOLDER, stream_id, HLS_EXTENSION)
            .await
            .map(|url| found(url, HLS_EXTENSION)),
        Technology::LlHls => prober
            .probe(&ll_hls_folder(), stream_id, HLS_EXTENSION)
            .await
            .map(|url| found(url, HLS_EXTENSION)),
        Technology::Dash => prober
            .probe_nested(STREAMS_FOLDER, stream_id, DASH_EXTENSION)
            .await
            .map(|url| found(url, DASH_EXTENSION)),
        Technology::Vod => {
            let plan = VodPlan::for_stream(stream_id, play_types);
            match prober
                .probe(STREAMS_FOLDER, stream_id, &plan.probe_extension)
                .await
            {
                Ok(url) => Ok(found(url, &plan.play_extension)),
                Err(e) => match plan.fallback {
                    Some(fallback) => prober
                        .probe(STREAMS_FOLDER, stream_id, &fallback)
                        .await
                        .map(|url| found(url, &fallback)),
                    None => Err(e),
                },
            }
        }
        Technology::WebRtc => Err(Error::engine("realtime streams are not probed")),
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stream_id", &self.config.stream_id)
            .field("state", &self.state)
            .field("html", &self.html)
            .field("dash", &self.dash)
            .finish()
    }
}
