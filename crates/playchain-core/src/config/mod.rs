//! Playback configuration resolution
//!
//! A [`PlaybackConfig`] is built once from either a host settings object or
//! the query parameters of the embedding page, and never changes afterwards.

mod location;
mod security;

pub use location::PageLocation;
pub use security::SecurityParams;

use crate::types::{Technology, STREAMS_FOLDER, WEBRTC_EXTENSION};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Technologies tried in order when none are configured
pub const DEFAULT_PLAY_ORDER: [Technology; 2] = [Technology::WebRtc, Technology::Hls];

/// Container preference for file playback
pub const DEFAULT_PLAY_TYPES: [&str; 2] = ["mp4", "webm"];

/// Target live latency in seconds for segmented streaming
pub const DEFAULT_TARGET_LATENCY: f64 = 3.0;

/// ICE servers handed to the realtime engine
pub const DEFAULT_ICE_SERVERS: &str = r#"[ { "urls": "stun:stun1.l.google.com:19302" } ]"#;

/// Consecutive backup-stream attempts before escalating
pub const DEFAULT_MAX_BACKUP_TRY_COUNT: u32 = 3;

pub const DEFAULT_PTZ_VALUE_STEP: f64 = 0.1;

pub const DEFAULT_PTZ_MOVEMENT: &str = "relative";

/// Host-supplied settings. Every field is optional; unset fields keep defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerSettings {
    pub stream_id: Option<String>,
    pub backup_stream_id: Option<String>,
    pub play_order: Option<Vec<String>>,
    pub play_type: Option<Vec<String>>,
    #[serde(rename = "httpBaseURL")]
    pub http_base_url: Option<String>,
    #[serde(rename = "websocketURL")]
    pub websocket_url: Option<String>,
    pub token: Option<String>,
    pub subscriber_id: Option<String>,
    pub subscriber_code: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub target_latency: Option<f64>,
    pub mute: Option<bool>,
    #[serde(alias = "autoplay")]
    pub auto_play: Option<bool>,
    pub force_play_with_audio: Option<bool>,
    #[serde(rename = "is360")]
    pub is_360: Option<bool>,
    pub with_credentials: Option<bool>,
    pub ice_servers: Option<String>,
    pub max_backup_try_count: Option<u32>,
    pub rest_jwt: Option<String>,
    pub ptz_value_step: Option<f64>,
    pub ptz_movement: Option<String>,
}

impl PlayerSettings {
    /// Read the legacy query-parameter surface of a page
    pub fn from_location(page: &PageLocation) -> Self {
        let mut settings = PlayerSettings {
            stream_id: page.param("id"),
            ..Default::default()
        };

        if settings.stream_id.is_none() {
            settings.stream_id = page.param("name");
            if settings.stream_id.is_some() {
                warn!("Please use id parameter instead of name parameter.");
            }
        }

        if page.param("is360").as_deref() == Some("true") {
            settings.is_360 = Some(true);
        }

        settings.play_type = page.param("playType").map(|v| split_list(&v));
        settings.play_order = page.param("playOrder").map(|v| split_list(&v));
        settings.token = page.param("token");
        settings.subscriber_id = page.param("subscriberId");
        settings.subscriber_code = page.param("subscriberCode");
        settings.start = page.param("start");
        settings.end = page.param("end");
        settings.backup_stream_id = page.param("backupStreamId");
        settings.rest_jwt = page.param("restJwt");
        settings.ptz_movement = page.param("ptzMovement");

        settings.auto_play = Some(page.param("autoplay").as_deref() != Some("false"));

        match page.param("mute").as_deref() {
            Some("false") => {
                // asked explicitly for audio, so a blocked autoplay is not retried muted
                settings.mute = Some(false);
                settings.force_play_with_audio = Some(true);
            }
            Some("true") => settings.mute = Some(true),
            _ => {}
        }

        if let Some(raw) = page.param("targetLatency") {
            match raw.trim().parse::<f64>() {
                Ok(latency) if !latency.is_nan() => settings.target_latency = Some(latency),
                _ => warn!(value = %raw, "targetLatency parameter is not a number. It will be ignored."),
            }
        }

        if let Some(raw) = page.param("ptzValueStep") {
            match raw.trim().parse::<f64>() {
                Ok(step) if !step.is_nan() => settings.ptz_value_step = Some(step),
                _ => warn!(value = %raw, "ptzValueStep parameter is not a number. It will be ignored."),
            }
        }

        match page.param("withCredentials").as_deref() {
            Some("true") => settings.with_credentials = Some(true),
            Some("false") => settings.with_credentials = Some(false),
            _ => {}
        }

        settings
    }
}

/// Where the configuration comes from
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Host settings object; the page supplies the origin for derived URLs
    Settings {
        settings: PlayerSettings,
        page: PageLocation,
    },
    /// Legacy mode: everything is read from the page query string
    Location(PageLocation),
}

/// Resolved playback configuration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackConfig {
    pub play_order: Vec<Technology>,
    pub stream_id: String,
    pub backup_stream_id: Option<String>,
    pub play_types: Vec<String>,
    /// Content base URL, always ending with `/`
    pub http_base_url: String,
    /// Realtime transport base URL, always ending with `/`
    pub websocket_url: String,
    pub security: SecurityParams,
    pub target_latency: f64,
    pub mute: bool,
    pub autoplay: bool,
    pub force_play_with_audio: bool,
    pub is_360: bool,
    pub with_credentials: bool,
    pub ice_servers: String,
    pub max_backup_try_count: u32,
    pub rest_jwt: Option<String>,
    pub ptz_value_step: f64,
    pub ptz_movement: String,
}

impl PlaybackConfig {
    /// Resolve a configuration, failing when no stream id can be found
    pub fn resolve(source: ConfigSource) -> Result<Self> {
        let (settings, page) = match source {
            ConfigSource::Settings { settings, page } => {
                info!("config object mode");
                (settings, page)
            }
            ConfigSource::Location(page) => {
                info!("getting from url mode");
                (PlayerSettings::from_location(&page), page)
            }
        };

        let stream_id = match settings.stream_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => {
                error!("{}", Error::MissingStreamId);
                return Err(Error::MissingStreamId);
            }
        };

        let (http_base_url, websocket_url) =
            derive_base_urls(settings.http_base_url, settings.websocket_url, &page);

        let play_order = settings
            .play_order
            .map(|names| parse_play_order(&names))
            .filter(|order| !order.is_empty())
            .unwrap_or_else(|| DEFAULT_PLAY_ORDER.to_vec());

        let play_types = settings
            .play_type
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| DEFAULT_PLAY_TYPES.iter().map(|t| t.to_string()).collect());

        let config = Self {
            play_order,
            stream_id,
            backup_stream_id: settings.backup_stream_id.filter(|id| !id.is_empty()),
            play_types,
            http_base_url,
            websocket_url,
            security: SecurityParams {
                token: settings.token,
                subscriber_id: settings.subscriber_id,
                subscriber_code: settings.subscriber_code,
                start: settings.start,
                end: settings.end,
            },
            target_latency: settings.target_latency.unwrap_or(DEFAULT_TARGET_LATENCY),
            mute: settings.mute.unwrap_or(false),
            autoplay: settings.auto_play.unwrap_or(true),
            force_play_with_audio: settings.force_play_with_audio.unwrap_or(false),
            is_360: settings.is_360.unwrap_or(false),
            with_credentials: settings.with_credentials.unwrap_or(false),
            ice_servers: settings
                .ice_servers
                .unwrap_or_else(|| DEFAULT_ICE_SERVERS.to_string()),
            max_backup_try_count: settings
                .max_backup_try_count
                .unwrap_or(DEFAULT_MAX_BACKUP_TRY_COUNT),
            rest_jwt: settings.rest_jwt,
            ptz_value_step: settings.ptz_value_step.unwrap_or(DEFAULT_PTZ_VALUE_STEP),
            ptz_movement: settings
                .ptz_movement
                .unwrap_or_else(|| DEFAULT_PTZ_MOVEMENT.to_string()),
        };

        info!(
            stream_id = %config.stream_id,
            play_order = ?config.play_order,
            http_base_url = %config.http_base_url,
            websocket_url = %config.websocket_url,
            "Playback configuration resolved"
        );

        Ok(config)
    }

    /// Realtime transport URL for a stream, security parameters included
    pub fn realtime_url(&self, stream_id: &str) -> String {
        let url = format!("{}{}.{}", self.websocket_url, stream_id, WEBRTC_EXTENSION);
        self.security.append_to(&url)
    }

    /// The stream id names a file under the streams folder and bypasses the chain
    pub fn is_direct_path(&self) -> bool {
        self.stream_id.starts_with(&format!("{}/", STREAMS_FOLDER))
    }

    /// Full URL of a direct-path stream
    pub fn direct_url(&self) -> String {
        self.security
            .append_to(&format!("{}{}", self.http_base_url, self.stream_id))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_play_order(names: &[String]) -> Vec<Technology> {
    names
        .iter()
        .filter_map(|name| match name.parse::<Technology>() {
            Ok(tech) => Some(tech),
            Err(e) => {
                warn!(error = %e, "Ignoring play order entry");
                None
            }
        })
        .collect()
}

fn ensure_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Content and realtime-transport base URLs, both ending with `/`
fn derive_base_urls(
    http_base_url: Option<String>,
    websocket_url: Option<String>,
    page: &PageLocation,
) -> (String, String) {
    match (http_base_url, websocket_url) {
        (None, websocket_url) => {
            let path = format!("{}{}", page.host(), page.application_path());
            let http = format!("{}//{}", page.protocol, path);
            let scheme = if page.is_secure() { "wss" } else { "ws" };
            let ws = websocket_url
                .map(ensure_trailing_slash)
                .unwrap_or_else(|| format!("{}://{}", scheme, path));
            (http, ws)
        }
        (Some(http), None) => {
            let http = ensure_trailing_slash(http);
            let ws = http.replacen("http", "ws", 1);
            (http, ws)
        }
        (Some(http), Some(ws)) => (ensure_trailing_slash(http), ensure_trailing_slash(ws)),
    }
}
