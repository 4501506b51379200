//! Host-facing player handle
//!
//! [`Player`] owns the sending side of the orchestrator inbox. Commands are
//! fire-and-forget; queries carry a oneshot reply. The orchestrator task is
//! spawned by [`Player::initialize`], so a player can be built outside a
//! runtime and listeners registered before playback starts.

use crate::config::{ConfigSource, PlaybackConfig};
use crate::engine::EngineFactory;
use crate::events::PlayerEvent;
use crate::loader::{required_modules, ComponentLoader, ModuleLoader, StaticModules};
use crate::orchestrator::{Command, Message, Orchestrator};
use crate::probe::{ExistenceCheck, HttpExistenceCheck};
use crate::types::{AttemptPhase, PlayerId};
use crate::visibility::{SphereRenderer, Surface, VisibilityController};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, info, info_span, instrument, warn, Instrument};

/// Surface used when the host renders nothing itself
struct Headless;

impl Surface for Headless {
    fn set_visible(&self, _visible: bool) {}
}

/// Builder for [`Player`]
pub struct PlayerBuilder {
    source: ConfigSource,
    engines: Option<Arc<dyn EngineFactory>>,
    container: Option<Arc<dyn Surface>>,
    placeholder: Option<Arc<dyn Surface>>,
    sphere: Option<Arc<dyn SphereRenderer>>,
    check: Option<Arc<dyn ExistenceCheck>>,
    modules: Option<Arc<dyn ModuleLoader>>,
}

impl PlayerBuilder {
    pub fn engines(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engines = Some(factory);
        self
    }

    pub fn container(mut self, surface: Arc<dyn Surface>) -> Self {
        self.container = Some(surface);
        self
    }

    pub fn placeholder(mut self, surface: Arc<dyn Surface>) -> Self {
        self.placeholder = Some(surface);
        self
    }

    /// Renderer used when the stream is 360°
    pub fn sphere(mut self, renderer: Arc<dyn SphereRenderer>) -> Self {
        self.sphere = Some(renderer);
        self
    }

    /// Replace the HTTP HEAD existence check
    pub fn existence_check(mut self, check: Arc<dyn ExistenceCheck>) -> Self {
        self.check = Some(check);
        self
    }

    pub fn module_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.modules = Some(loader);
        self
    }

    /// Resolve the configuration and assemble the player.
    ///
    /// Fails with [`Error::MissingStreamId`] before anything else is checked.
    pub fn build(self) -> Result<Player> {
        let config = Arc::new(PlaybackConfig::resolve(self.source)?);
        let engines = self
            .engines
            .ok_or_else(|| Error::InvalidConfig("an engine factory is required".into()))?;

        let mut visibility = VisibilityController::new(
            self.container.unwrap_or_else(|| Arc::new(Headless)),
            self.placeholder,
        );
        match self.sphere {
            Some(sphere) if config.is_360 => visibility = visibility.with_sphere(sphere),
            Some(_) => debug!("Sphere renderer ignored for a flat stream"),
            None => {}
        }

        let check = self
            .check
            .unwrap_or_else(|| Arc::new(HttpExistenceCheck::new()));
        let loader = ComponentLoader::new(self.modules.unwrap_or_else(|| Arc::new(StaticModules)));

        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(config.clone(), engines, check, visibility, tx.clone());
        let phase = orchestrator.subscribe_phase();

        Ok(Player {
            id: PlayerId::new(),
            config,
            commands: tx,
            phase,
            pending: Mutex::new(Some((orchestrator, rx))),
            loader,
            running: AtomicBool::new(false),
        })
    }
}

/// Embeddable stream player
pub struct Player {
    id: PlayerId,
    config: Arc<PlaybackConfig>,
    commands: UnboundedSender<Message>,
    phase: watch::Receiver<AttemptPhase>,
    /// Orchestrator waiting for `initialize`
    pending: Mutex<Option<(Orchestrator, UnboundedReceiver<Message>)>>,
    loader: ComponentLoader,
    running: AtomicBool,
}

impl Player {
    pub fn builder(source: ConfigSource) -> PlayerBuilder {
        PlayerBuilder {
            source,
            engines: None,
            container: None,
            placeholder: None,
            sphere: None,
            check: None,
            modules: None,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Load the engine components the configuration needs, start the
    /// orchestrator task and begin playback
    #[instrument(skip(self), fields(player = %self.id, stream_id = %self.config.stream_id))]
    pub async fn initialize(&self) -> Result<()> {
        self.loader
            .ensure_all(&required_modules(&self.config))
            .await?;

        let Some((orchestrator, inbox)) = self.pending.lock().await.take() else {
            warn!("Player is already initialized");
            return Ok(());
        };

        let span = info_span!("player", id = %self.id);
        tokio::spawn(orchestrator.run(inbox).instrument(span));
        self.running.store(true, Ordering::Release);
        info!("Player initialized");

        self.play()
    }

    /// Restart the chain from the first technology on the primary stream
    pub fn play(&self) -> Result<()> {
        self.send(Command::Play)
    }

    /// Dispose the engines, cancel every timer and stop the orchestrator task
    pub fn destroy(&self) -> Result<()> {
        self.send(Command::Destroy)
    }

    pub fn mute_player(&self, muted: bool) -> Result<()> {
        self.send(Command::SetMuted(muted))
    }

    pub async fn is_muted(&self) -> Result<bool> {
        self.query(Command::IsMuted).await
    }

    /// Register the listener for playback events, replacing any previous one
    pub fn add_player_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.send(Command::SetPlayerListener(Arc::new(listener)))
    }

    /// Register the listener for realtime data-channel messages
    pub fn add_webrtc_data_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&Bytes) + Send + Sync + 'static,
    {
        self.send(Command::SetDataListener(Arc::new(listener)))
    }

    /// Register the listener for timed metadata text
    pub fn add_id3_listener<F>(&self, listener: F) -> Result<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.send(Command::SetMetadataListener(Arc::new(listener)))
    }

    /// Send data over the realtime data channel. Returns false when the
    /// realtime engine is not playing or the send failed.
    pub async fn send_webrtc_data(&self, data: impl Into<Bytes>) -> bool {
        let data = data.into();
        match self.query(|reply| Command::SendData(data, reply)).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!(error = %e, "Data could not be sent");
                false
            }
        }
    }

    /// URL of the playing source
    pub async fn source(&self) -> Result<Option<String>> {
        self.query(Command::Source).await
    }

    /// Playback position in seconds
    pub async fn time(&self) -> Result<Option<f64>> {
        self.query(Command::Time).await
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase.borrow().clone()
    }

    /// Observe phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<AttemptPhase> {
        self.phase.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(Message::Command(command))
            .map_err(|_| Error::PlayerClosed)
    }

    async fn query<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        if !self.running.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| Error::PlayerClosed)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        // the orchestrator holds its own inbox sender, so it has to be told
        let _ = self.commands.send(Message::Command(Command::Destroy));
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("stream_id", &self.config.stream_id)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}
