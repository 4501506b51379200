//! Playchain Core - Playback orchestration for embeddable stream players
//!
//! This crate decides how a live or recorded stream gets played:
//! - Configuration resolution from host settings or page query parameters
//! - Technology fallback across realtime, adaptive HTTP and file playback
//! - Backup stream substitution with bounded retries
//! - HTTP HEAD probing of candidate resource paths
//! - Event normalization across two media engines
//! - Surface visibility and optional component loading
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Playchain Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Config    │  │   Resource   │  │  Component   │           │
//! │  │   Resolver   │  │    Prober    │  │    Loader    │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │◀──── Player handle           │
//! │                    │ Orchestrator│                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │  Visibility  │  │   Engine    │  │    Event     │            │
//! │  │  Controller  │  │  Adapters   │  │     Bus      │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod loader;
pub mod orchestrator;
pub mod player;
pub mod probe;
pub mod types;
pub mod visibility;

pub use config::{ConfigSource, PageLocation, PlaybackConfig, PlayerSettings, SecurityParams};
pub use engine::{
    DashEngineEvent, EngineFactory, EngineKind, EngineSink, EngineSource, HtmlEngineEvent,
    MediaEngine, PlayRejection,
};
pub use error::{Error, Result};
pub use events::{IceState, PlayerEvent, RealtimeError, RealtimeInfo};
pub use loader::{ComponentLoader, EngineModule, ModuleLoader};
pub use player::{Player, PlayerBuilder};
pub use probe::{ExistenceCheck, HttpExistenceCheck, ResourceProber};
pub use types::*;
pub use visibility::{SphereRenderer, Surface};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version once at host start-up
pub fn init() {
    tracing::info!(version = VERSION, "Playchain Core initialized");
}
