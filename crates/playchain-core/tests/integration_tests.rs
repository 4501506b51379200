//! Integration tests for Playchain Core

use async_trait::async_trait;
use bytes::Bytes;
use playchain_core::engine::EngineEvent;
use playchain_core::orchestrator::{Command, Flow, Message, Orchestrator};
use playchain_core::visibility::VisibilityController;
use playchain_core::{
    AttemptPhase, ConfigSource, EngineFactory, EngineKind, EngineModule, EngineSink,
    EngineSource, Error, ExistenceCheck, HtmlEngineEvent, HttpExistenceCheck, IceState,
    MediaEngine, ModuleLoader, PageLocation, PlayRejection, PlaybackConfig, Player, PlayerEvent,
    RealtimeError, RealtimeInfo, ResourceProber, Result, SecurityParams, Surface, Technology,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::Instant;

const PAGE: &str = "https://example.com/live/play.html";
const HLS_S1_ADAPTIVE: &str = "https://example.com/live/streams/s1_adaptive.m3u8";
const HLS_S1: &str = "https://example.com/live/streams/s1.m3u8";

// =============================================================================
// Mock engines
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load { url: String, mime: &'static str },
    Play,
    Pause,
    Muted(bool),
    Send(usize),
    NotifyWhenLive(String),
    Dispose,
}

#[derive(Default)]
struct EngineLog {
    created: Vec<(EngineKind, Instant)>,
    sinks: Vec<EngineSink>,
    calls: Vec<Call>,
}

struct MockFactory {
    log: Arc<Mutex<EngineLog>>,
    reject_autoplay: bool,
}

impl EngineFactory for MockFactory {
    fn create(&self, kind: EngineKind, sink: EngineSink) -> Result<Box<dyn MediaEngine>> {
        let mut log = self.log.lock().unwrap();
        log.created.push((kind, Instant::now()));
        log.sinks.push(sink.clone());
        Ok(Box::new(MockEngine {
            log: self.log.clone(),
            sink,
            reject_autoplay: self.reject_autoplay,
            muted: false,
            source: None,
        }))
    }
}

struct MockEngine {
    log: Arc<Mutex<EngineLog>>,
    sink: EngineSink,
    reject_autoplay: bool,
    muted: bool,
    source: Option<String>,
}

impl MockEngine {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl MediaEngine for MockEngine {
    fn load(&mut self, source: &EngineSource) -> Result<()> {
        self.muted = source.muted;
        self.source = Some(source.url.clone());
        self.record(Call::Load {
            url: source.url.clone(),
            mime: source.mime_type,
        });
        Ok(())
    }

    fn play(&mut self) {
        self.record(Call::Play);
        if self.reject_autoplay {
            self.sink
                .emit(HtmlEngineEvent::PlayRejected(PlayRejection::NotAllowed));
        }
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.record(Call::Muted(muted));
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn current_time(&self) -> f64 {
        12.5
    }

    fn current_source(&self) -> Option<String> {
        self.source.clone()
    }

    fn send_data(&mut self, data: Bytes) -> Result<()> {
        self.record(Call::Send(data.len()));
        Ok(())
    }

    fn notify_when_live(&mut self, stream_id: &str) -> Result<()> {
        self.record(Call::NotifyWhenLive(stream_id.to_string()));
        Ok(())
    }

    fn dispose(&mut self) {
        self.record(Call::Dispose);
    }
}

struct KnownUrls(HashSet<String>);

impl KnownUrls {
    fn new(existing: &[&str]) -> Arc<Self> {
        Arc::new(Self(existing.iter().map(|s| s.to_string()).collect()))
    }
}

#[async_trait]
impl ExistenceCheck for KnownUrls {
    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.0.contains(url))
    }
}

#[derive(Default)]
struct Element(AtomicBool);

impl Surface for Element {
    fn set_visible(&self, visible: bool) {
        self.0.store(visible, Ordering::SeqCst);
    }
}

fn config(query: &str) -> PlaybackConfig {
    let page = PageLocation::parse(&format!("{}?{}", PAGE, query)).unwrap();
    PlaybackConfig::resolve(ConfigSource::Location(page)).unwrap()
}

struct Harness {
    orchestrator: Orchestrator,
    inbox: UnboundedReceiver<Message>,
    log: Arc<Mutex<EngineLog>>,
    surface: Arc<Element>,
}

impl Harness {
    fn new(query: &str, existing: &[&str]) -> Self {
        Self::build(query, existing, false)
    }

    fn build(query: &str, existing: &[&str], reject_autoplay: bool) -> Self {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let surface = Arc::new(Element::default());
        let factory = Arc::new(MockFactory {
            log: log.clone(),
            reject_autoplay,
        });
        let (tx, inbox) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(
            Arc::new(config(query)),
            factory,
            KnownUrls::new(existing),
            VisibilityController::new(surface.clone(), None),
            tx,
        );

        Self {
            orchestrator,
            inbox,
            log,
            surface,
        }
    }

    /// Handle the next message, letting paused time run up to it
    async fn step(&mut self) -> Flow {
        let message = self.inbox.recv().await.expect("inbox closed");
        self.orchestrator.handle(message)
    }

    /// Raise a native event on the most recently created engine
    fn emit(&self, event: impl Into<EngineEvent>) {
        let log = self.log.lock().unwrap();
        log.sinks.last().expect("no engine created").emit(event);
    }

    fn created(&self) -> Vec<(EngineKind, Instant)> {
        self.log.lock().unwrap().created.clone()
    }

    fn loaded(&self) -> Vec<(String, &'static str)> {
        self.log
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Load { url, mime } => Some((url.clone(), *mime)),
                _ => None,
            })
            .collect()
    }

    fn loaded_urls(&self) -> Vec<String> {
        self.loaded().into_iter().map(|(url, _)| url).collect()
    }

    fn count(&self, wanted: &Call) -> usize {
        self.log
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| *call == wanted)
            .count()
    }
}

fn realtime_error(code: &str) -> HtmlEngineEvent {
    HtmlEngineEvent::RealtimeError(RealtimeError::new(code))
}

fn ice(state: IceState) -> HtmlEngineEvent {
    HtmlEngineEvent::RealtimeInfo(RealtimeInfo::IceConnectionStateChanged { state })
}

// =============================================================================
// Fallback Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_realtime_attempt_uses_page_derived_url() {
    let mut h = Harness::new("id=s1", &[]);
    h.orchestrator.play();

    assert_eq!(
        h.loaded(),
        vec![("wss://example.com/live/s1.webrtc".to_string(), "video/webrtc")]
    );
    assert!(matches!(
        h.orchestrator.phase(),
        AttemptPhase::Attempting { technology: Technology::WebRtc, .. }
    ));
    assert!(!h.surface.0.load(Ordering::SeqCst));

    h.emit(HtmlEngineEvent::Play);
    h.step().await;
    assert_eq!(h.orchestrator.phase(), AttemptPhase::Playing);
    assert!(h.surface.0.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_technology_cycle_wraps_with_retry_delay() {
    let mut h = Harness::new("id=s1&playOrder=webrtc,hls", &[]);
    h.orchestrator.play();

    h.emit(realtime_error("highResourceUsage"));
    h.step().await;
    assert!(h.orchestrator.is_retry_pending());
    assert_eq!(h.orchestrator.phase(), AttemptPhase::Failed);

    // retry fires, hls is probed and missing
    h.step().await;
    assert_eq!(h.orchestrator.state().current_technology, Some(Technology::Hls));
    h.step().await;
    assert!(h.orchestrator.is_retry_pending());

    // wrapped back to the head of the order
    h.step().await;
    let created = h.created();
    assert_eq!(created.len(), 2);
    let waited = created[1].1 - created[0].1;
    assert!(waited >= Duration::from_millis(6000));
    assert!(waited < Duration::from_millis(6100));
    assert_eq!(h.orchestrator.state().technology_index, Some(0));
    assert_eq!(
        h.loaded_urls()[1],
        "wss://example.com/live/s1.webrtc".to_string()
    );
}

#[tokio::test(start_paused = true)]
async fn test_only_one_retry_is_pending() {
    let mut h = Harness::new("id=s1&playOrder=webrtc", &[]);
    h.orchestrator.play();

    h.emit(HtmlEngineEvent::Error("decode".into()));
    h.step().await;
    h.emit(realtime_error("unauthorized_access"));
    h.step().await;
    assert!(h.orchestrator.is_retry_pending());

    // debounce window ends while the retry is still pending
    h.step().await;
    assert!(h.orchestrator.is_retry_pending());
    assert_eq!(h.created().len(), 1);

    h.step().await;
    let created = h.created();
    assert_eq!(created.len(), 2);
    let waited = created[1].1 - created[0].1;
    assert!(waited >= Duration::from_millis(3000));
    assert!(waited < Duration::from_millis(3100));
}

#[tokio::test(start_paused = true)]
async fn test_backup_stream_alternates_with_primary() {
    let mut h = Harness::new("id=S&backupStreamId=T&playOrder=webrtc", &[]);
    h.orchestrator.play();

    for _ in 0..2 {
        h.emit(realtime_error("WebSocketNotConnected"));
        h.step().await;
        h.step().await;
    }

    assert_eq!(
        h.loaded_urls(),
        vec![
            "wss://example.com/live/S.webrtc".to_string(),
            "wss://example.com/live/T.webrtc".to_string(),
            "wss://example.com/live/S.webrtc".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_backup_interval_is_bounded() {
    let mut h = Harness::new("id=S&backupStreamId=T&playOrder=webrtc", &[]);
    h.orchestrator.play();

    h.emit(realtime_error("no_stream_exist"));
    h.step().await;
    assert!(h.orchestrator.is_backup_interval_running());

    for tries in 1..=3 {
        h.step().await;
        assert_eq!(h.orchestrator.state().backup_try_count, tries);
    }

    // fourth tick gives up on the backup
    h.step().await;
    assert!(!h.orchestrator.is_backup_interval_running());
    assert!(h.orchestrator.is_retry_pending());

    h.step().await;
    let urls = h.loaded_urls();
    assert_eq!(urls.len(), 5);
    assert!(urls[1..4]
        .iter()
        .all(|url| url == "wss://example.com/live/T.webrtc"));
    assert_eq!(urls[4], "wss://example.com/live/S.webrtc");
}

#[tokio::test(start_paused = true)]
async fn test_missing_playlist_with_several_technologies_moves_on() {
    let mut h = Harness::new("id=S&backupStreamId=T&playOrder=hls,webrtc", &[]);
    h.orchestrator.play();

    // probe result: neither playlist exists
    h.step().await;
    assert!(!h.orchestrator.is_backup_interval_running());
    assert!(h.orchestrator.is_retry_pending());

    // the backup is tried once on the same technology, not periodically
    h.step().await;
    assert_eq!(h.orchestrator.state().current_technology, Some(Technology::Hls));
    assert_eq!(h.orchestrator.state().active_stream_id, "T");
    assert_eq!(h.orchestrator.state().backup_try_count, 0);
    assert!(h.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_live_stream_with_several_technologies_moves_on() {
    let mut h = Harness::new("id=S&backupStreamId=T&playOrder=webrtc,hls", &[]);
    h.orchestrator.play();

    h.emit(realtime_error("no_stream_exist"));
    h.step().await;
    assert!(!h.orchestrator.is_backup_interval_running());
    assert!(h.orchestrator.is_retry_pending());
    assert_eq!(h.count(&Call::NotifyWhenLive("S".into())), 0);

    h.step().await;
    assert_eq!(
        h.loaded_urls(),
        vec![
            "wss://example.com/live/S.webrtc".to_string(),
            "wss://example.com/live/T.webrtc".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_low_latency_playlist_tries_backup_periodically() {
    let mut h = Harness::new("id=S&backupStreamId=T&playOrder=ll-hls", &[]);
    h.orchestrator.play();

    h.step().await;
    assert!(h.orchestrator.is_backup_interval_running());
    assert!(!h.orchestrator.is_retry_pending());

    // first tick switches the attempt to the backup stream
    h.step().await;
    assert_eq!(h.orchestrator.state().backup_try_count, 1);
    assert_eq!(h.orchestrator.state().active_stream_id, "T");
    assert_eq!(
        h.orchestrator.state().current_technology,
        Some(Technology::LlHls)
    );
    assert!(h.orchestrator.is_backup_interval_running());
}

#[tokio::test(start_paused = true)]
async fn test_established_connection_stops_backup_tries() {
    let mut h = Harness::new("id=S&backupStreamId=T&playOrder=webrtc", &[]);
    h.orchestrator.play();

    h.emit(realtime_error("no_stream_exist"));
    h.step().await;
    h.step().await;
    assert_eq!(h.orchestrator.state().backup_try_count, 1);

    h.emit(ice(IceState::Connected));
    h.step().await;
    assert!(!h.orchestrator.is_backup_interval_running());
    assert!(h.orchestrator.state().ice_connected);
    assert_eq!(h.orchestrator.state().backup_try_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_single_technology_waits_for_stream_start() {
    let mut h = Harness::new("id=s1&playOrder=webrtc", &[]);
    h.orchestrator.play();

    h.emit(realtime_error("no_stream_exist"));
    h.step().await;
    assert_eq!(h.count(&Call::NotifyWhenLive("s1".into())), 1);
    assert!(!h.orchestrator.is_retry_pending());

    h.emit(HtmlEngineEvent::RealtimeInfo(RealtimeInfo::StreamStarted {
        stream_id: "s1".into(),
    }));
    h.step().await;
    assert_eq!(h.created().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ended_after_connecting_restarts_immediately() {
    let mut h = Harness::new("id=s1&playOrder=webrtc,hls", &[]);
    h.orchestrator.play();

    h.emit(ice(IceState::Completed));
    h.step().await;
    h.emit(HtmlEngineEvent::Ended);
    h.step().await;

    let created = h.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].1, created[1].1);
    assert!(!h.orchestrator.is_retry_pending());
    assert_eq!(h.orchestrator.state().current_technology, Some(Technology::WebRtc));
}

#[tokio::test(start_paused = true)]
async fn test_ended_adaptive_stream_replays_later() {
    let mut h = Harness::new("id=s1&playOrder=hls", &[HLS_S1_ADAPTIVE]);
    h.orchestrator.play();
    h.step().await;
    assert_eq!(h.loaded(), vec![(HLS_S1_ADAPTIVE.to_string(), "application/x-mpegURL")]);

    let ended_at = Instant::now();
    h.emit(HtmlEngineEvent::Ended);
    h.step().await;
    assert_eq!(h.count(&Call::Dispose), 1);

    h.step().await;
    assert!(ended_at.elapsed() >= Duration::from_secs(10));
    h.step().await;
    assert_eq!(h.created().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_codec_mismatch_switches_to_hls() {
    let mut h = Harness::new("id=s1&playOrder=webrtc", &[HLS_S1]);
    h.orchestrator.play();

    h.emit(realtime_error("notSetRemoteDescription"));
    h.step().await;
    assert_eq!(h.orchestrator.state().current_technology, Some(Technology::Hls));
    assert_eq!(h.orchestrator.state().technology_index, None);

    h.step().await;
    assert_eq!(h.loaded_urls()[1], HLS_S1);
}

#[tokio::test(start_paused = true)]
async fn test_generic_errors_are_debounced() {
    let mut h = Harness::new("id=s1&playOrder=webrtc", &[]);
    h.orchestrator.play();
    let started = Instant::now();

    h.emit(HtmlEngineEvent::Error("network".into()));
    h.emit(HtmlEngineEvent::Error("network".into()));
    h.step().await;
    h.step().await;
    assert!(!h.orchestrator.is_retry_pending());

    h.step().await;
    assert!(started.elapsed() >= Duration::from_millis(2500));
    assert!(h.orchestrator.is_retry_pending());
}

#[tokio::test(start_paused = true)]
async fn test_stale_probe_results_are_discarded() {
    let mut h = Harness::new("id=s1&playOrder=hls", &[HLS_S1_ADAPTIVE]);
    h.orchestrator.play();
    h.orchestrator.play();

    h.step().await;
    h.step().await;
    assert_eq!(h.created().len(), 1);
    assert_eq!(h.orchestrator.state().generation, 2);
}

#[tokio::test(start_paused = true)]
async fn test_vod_falls_back_to_second_play_type() {
    let mut h = Harness::new(
        "id=clip&playOrder=vod",
        &["https://example.com/live/streams/clip.webm"],
    );
    h.orchestrator.play();
    h.step().await;

    assert_eq!(
        h.loaded(),
        vec![(
            "https://example.com/live/streams/clip.webm".to_string(),
            "video/webm"
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_vod_is_terminal() {
    let mut h = Harness::new("id=clip&playOrder=vod", &[]);
    h.orchestrator.play();
    h.step().await;

    assert_eq!(h.orchestrator.phase(), AttemptPhase::Failed);
    assert!(!h.orchestrator.is_retry_pending());
    assert!(h.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_direct_path_plays_with_dash_engine() {
    let mut h = Harness::new("id=streams/vod.mpd", &[]);
    h.orchestrator.play();

    assert_eq!(h.created()[0].0, EngineKind::Dash);
    assert_eq!(
        h.loaded(),
        vec![(
            "https://example.com/live/streams/vod.mpd".to_string(),
            "application/dash+xml"
        )]
    );
}

// =============================================================================
// Autoplay and Event Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_blocked_autoplay_retries_muted_once() {
    let mut h = Harness::build("id=s1", &[], true);
    h.orchestrator.play();

    h.step().await;
    h.step().await;
    assert_eq!(h.count(&Call::Muted(true)), 1);
    assert_eq!(h.count(&Call::Play), 2);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_autoplay_with_forced_audio_is_not_retried() {
    let mut h = Harness::build("id=s1&mute=false", &[], true);
    h.orchestrator.play();

    h.step().await;
    assert_eq!(h.count(&Call::Muted(true)), 0);
    assert_eq!(h.count(&Call::Play), 1);
}

#[tokio::test(start_paused = true)]
async fn test_events_relayed_with_live_payloads() {
    let mut h = Harness::new("id=s1", &[]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    h.orchestrator.handle(Message::Command(Command::SetPlayerListener(Arc::new(
        move |e: &PlayerEvent| s.lock().unwrap().push(e.clone()),
    ))));
    h.orchestrator.play();

    h.emit(HtmlEngineEvent::TimeUpdate);
    h.emit(HtmlEngineEvent::Error("decode".into()));
    h.step().await;
    h.step().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], PlayerEvent::TimeUpdate { current_time: 12.5 });
    match &seen[1] {
        PlayerEvent::Error(payload) => {
            assert_eq!(payload.technology, Some(Technology::WebRtc));
            assert_eq!(payload.message, "decode");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_events_from_disposed_engine_are_ignored() {
    let mut h = Harness::new("id=s1&playOrder=webrtc", &[]);
    h.orchestrator.play();
    let old_sink = h.log.lock().unwrap().sinks[0].clone();

    h.orchestrator.play();
    old_sink.emit(realtime_error("highResourceUsage"));
    h.step().await;
    assert!(!h.orchestrator.is_retry_pending());
}

#[tokio::test(start_paused = true)]
async fn test_data_channel_requires_realtime() {
    let mut h = Harness::new("id=s1", &[]);
    h.orchestrator.play();
    assert!(h.orchestrator.send_data(Bytes::from_static(b"hi")));
    assert_eq!(h.count(&Call::Send(2)), 1);

    let mut h = Harness::new("id=s1&playOrder=hls", &[]);
    h.orchestrator.play();
    assert!(!h.orchestrator.send_data(Bytes::from_static(b"hi")));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_cancels_pending_work() {
    let mut h = Harness::new("id=s1", &[]);
    h.orchestrator.play();
    h.emit(realtime_error("user_blocked"));
    h.step().await;
    assert!(h.orchestrator.is_retry_pending());

    let flow = h.orchestrator.handle(Message::Command(Command::Destroy));
    assert_eq!(flow, Flow::Stop);
    assert!(!h.orchestrator.is_retry_pending());
    assert_eq!(h.orchestrator.phase(), AttemptPhase::Idle);
}

// =============================================================================
// Player Tests
// =============================================================================

fn player_for(query: &str) -> playchain_core::PlayerBuilder {
    let page = PageLocation::parse(&format!("{}?{}", PAGE, query)).unwrap();
    Player::builder(ConfigSource::Location(page))
        .engines(Arc::new(MockFactory {
            log: Arc::new(Mutex::new(EngineLog::default())),
            reject_autoplay: false,
        }))
        .existence_check(KnownUrls::new(&[]))
}

#[test]
fn test_build_requires_stream_id() {
    let page = PageLocation::parse(PAGE).unwrap();
    let result = Player::builder(ConfigSource::Location(page)).build();
    assert!(matches!(result, Err(Error::MissingStreamId)));
}

#[test]
fn test_build_requires_engines() {
    let page = PageLocation::parse(&format!("{}?id=s1", PAGE)).unwrap();
    let result = Player::builder(ConfigSource::Location(page)).build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn test_queries_before_initialize() {
    let player = player_for("id=s1").build().unwrap();
    assert!(matches!(player.is_muted().await, Err(Error::NotInitialized)));
    assert_eq!(player.phase(), AttemptPhase::Idle);
}

#[tokio::test]
async fn test_initialize_starts_playback() {
    let player = player_for("id=s1&mute=true").build().unwrap();
    player.initialize().await.unwrap();

    assert_eq!(
        player.source().await.unwrap(),
        Some("wss://example.com/live/s1.webrtc".to_string())
    );
    assert_eq!(player.time().await.unwrap(), Some(12.5));
    assert!(player.is_muted().await.unwrap());
    assert!(matches!(player.phase(), AttemptPhase::Attempting { .. }));
    assert!(player.send_webrtc_data(Bytes::from_static(b"ping")).await);
}

#[tokio::test]
async fn test_mute_player_is_reported() {
    let player = player_for("id=s1").build().unwrap();
    player.initialize().await.unwrap();

    assert!(!player.is_muted().await.unwrap());
    player.mute_player(true).unwrap();
    assert!(player.is_muted().await.unwrap());
}

#[tokio::test]
async fn test_destroyed_player_is_closed() {
    let player = player_for("id=s1").build().unwrap();
    player.initialize().await.unwrap();
    player.destroy().unwrap();

    assert!(matches!(player.source().await, Err(Error::PlayerClosed)));
    assert!(!player.send_webrtc_data(Bytes::from_static(b"x")).await);
}

struct FailingLoader;

#[async_trait]
impl ModuleLoader for FailingLoader {
    async fn load(&self, module: EngineModule) -> Result<()> {
        Err(Error::ModuleLoad {
            module: module.to_string(),
            reason: "bundle missing".into(),
        })
    }
}

#[tokio::test]
async fn test_initialize_fails_when_component_missing() {
    let player = player_for("id=s1")
        .module_loader(Arc::new(FailingLoader))
        .build()
        .unwrap();

    let result = player.initialize().await;
    assert!(matches!(result, Err(Error::ModuleLoad { .. })));
    assert!(matches!(player.time().await, Err(Error::NotInitialized)));
}

// =============================================================================
// HTTP Probe Tests
// =============================================================================

async fn origin() -> String {
    use axum::{routing::get, Router};

    let app = Router::new()
        .route("/live/streams/s1.m3u8", get(|| async { "#EXTM3U" }))
        .route("/live/streams/cam_adaptive.m3u8", get(|| async { "#EXTM3U" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/live/", addr)
}

#[tokio::test]
async fn test_http_probe_falls_back_to_plain_name() {
    let base = origin().await;
    let security = SecurityParams {
        token: Some("tok".into()),
        ..Default::default()
    };
    let prober = ResourceProber::new(base.clone(), security, Arc::new(HttpExistenceCheck::new()));

    let url = prober.probe("streams", "s1", "m3u8").await.unwrap();
    assert_eq!(url, format!("{}streams/s1.m3u8?token=tok", base));

    let url = prober.probe("streams", "cam", "m3u8").await.unwrap();
    assert_eq!(url, format!("{}streams/cam_adaptive.m3u8?token=tok", base));
}

#[tokio::test]
async fn test_http_probe_reports_missing_resource() {
    let base = origin().await;
    let prober = ResourceProber::new(
        base,
        SecurityParams::default(),
        Arc::new(HttpExistenceCheck::new()),
    );

    let err = prober.probe("streams", "ghost", "m3u8").await.unwrap_err();
    assert_eq!(err.to_string(), "resource_is_not_available");
}
