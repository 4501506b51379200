//! Optional engine component loading
//!
//! Hosts that ship engines as separately loaded bundles implement
//! [`ModuleLoader`]; [`ComponentLoader`] makes every load idempotent.

use crate::config::PlaybackConfig;
use crate::types::Technology;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Loadable engine component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineModule {
    /// HTML media engine with adaptive HTTP support
    HtmlEngine,
    /// Realtime transport plugin for the HTML engine
    RealtimePlugin,
    /// Segmented streaming engine
    DashEngine,
    /// 360° sphere renderer
    Sphere,
}

impl std::fmt::Display for EngineModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineModule::HtmlEngine => write!(f, "html-engine"),
            EngineModule::RealtimePlugin => write!(f, "realtime-plugin"),
            EngineModule::DashEngine => write!(f, "dash-engine"),
            EngineModule::Sphere => write!(f, "sphere"),
        }
    }
}

/// Modules a configuration needs, in load order
pub fn required_modules(config: &PlaybackConfig) -> Vec<EngineModule> {
    let uses = |tech: Technology| config.play_order.contains(&tech);
    let mut modules = Vec::new();

    if uses(Technology::Hls)
        || uses(Technology::LlHls)
        || uses(Technology::Vod)
        || uses(Technology::WebRtc)
        || config.is_direct_path()
    {
        modules.push(EngineModule::HtmlEngine);
    }
    if uses(Technology::WebRtc) {
        modules.push(EngineModule::RealtimePlugin);
    }
    if uses(Technology::Dash) || config.is_direct_path() {
        modules.push(EngineModule::DashEngine);
    }
    if config.is_360 {
        modules.push(EngineModule::Sphere);
    }
    modules
}

/// Host capability that brings an engine component into scope
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, module: EngineModule) -> Result<()>;
}

/// Loader for hosts that link every engine statically
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticModules;

#[async_trait]
impl ModuleLoader for StaticModules {
    async fn load(&self, _module: EngineModule) -> Result<()> {
        Ok(())
    }
}

/// Caches successful loads so repeated calls are free
pub struct ComponentLoader {
    inner: Arc<dyn ModuleLoader>,
    loaded: Mutex<HashSet<EngineModule>>,
}

impl ComponentLoader {
    pub fn new(inner: Arc<dyn ModuleLoader>) -> Self {
        Self {
            inner,
            loaded: Mutex::new(HashSet::new()),
        }
    }

    /// Load a module unless it is already loaded
    pub async fn ensure_loaded(&self, module: EngineModule) -> Result<()> {
        // held across the load so concurrent callers wait for the first one
        let mut loaded = self.loaded.lock().await;
        if loaded.contains(&module) {
            return Ok(());
        }

        match self.inner.load(module).await {
            Ok(()) => {
                info!(module = %module, "Component loaded");
                loaded.insert(module);
                Ok(())
            }
            Err(e) => {
                error!(module = %module, error = %e, "Component is not loaded");
                Err(e)
            }
        }
    }

    /// Load every module in order, stopping at the first failure
    pub async fn ensure_all(&self, modules: &[EngineModule]) -> Result<()> {
        for module in modules {
            self.ensure_loaded(*module).await?;
        }
        Ok(())
    }

    pub async fn is_loaded(&self, module: EngineModule) -> bool {
        self.loaded.lock().await.contains(&module)
    }
}

impl Default for ComponentLoader {
    fn default() -> Self {
        Self::new(Arc::new(StaticModules))
    }
}
