//! CLI command implementations

use crate::output::{render_rows, OutputFormat, ResourceRow};
use anyhow::{bail, Context};
use playchain_core::orchestrator::{resolve_resource, VodPlan};
use playchain_core::probe::{ll_hls_folder, PathTemplate};
use playchain_core::{
    ConfigSource, HttpExistenceCheck, PageLocation, PlaybackConfig, PlayerSettings,
    ResourceProber, Technology, DASH_EXTENSION, HLS_EXTENSION, STREAMS_FOLDER,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

fn load_config(page: &str, settings: Option<&Path>) -> anyhow::Result<PlaybackConfig> {
    let page = PageLocation::parse(page).with_context(|| format!("invalid page url: {}", page))?;

    let source = match settings {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let settings: PlayerSettings = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            ConfigSource::Settings { settings, page }
        }
        None => ConfigSource::Location(page),
    };

    Ok(PlaybackConfig::resolve(source)?)
}

fn prober_for(config: &PlaybackConfig) -> ResourceProber {
    ResourceProber::new(
        config.http_base_url.clone(),
        config.security.clone(),
        Arc::new(HttpExistenceCheck::new()),
    )
}

/// Streams the chain can visit, primary first
fn streams(config: &PlaybackConfig) -> Vec<String> {
    let mut streams = vec![config.stream_id.clone()];
    if let Some(ref backup) = config.backup_stream_id {
        streams.push(backup.clone());
    }
    streams
}

/// Resolve and print a playback configuration
pub fn resolve(page: &str, settings: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let config = load_config(page, settings)?;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text | OutputFormat::Table => {
            println!("Playback configuration:");
            println!("  Stream: {}", config.stream_id);
            if let Some(ref backup) = config.backup_stream_id {
                println!("  Backup stream: {}", backup);
            }
            let order: Vec<&str> = config.play_order.iter().map(|t| t.as_str()).collect();
            println!("  Play order: {}", order.join(", "));
            println!("  Play types: {}", config.play_types.join(", "));
            println!("  HTTP base: {}", config.http_base_url);
            println!("  Realtime base: {}", config.websocket_url);
            println!("  Autoplay: {}", config.autoplay);
            println!("  Muted: {}", config.mute);
            println!("  Target latency: {}s", config.target_latency);
            if !config.security.is_empty() {
                println!("  Security: {}", config.security.query_string());
            }
            if config.is_direct_path() {
                println!("  Direct path: {}", config.direct_url());
            }
        }
    }

    Ok(())
}

/// Print every URL the chain would try, without touching the network
pub fn urls(page: &str, settings: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let config = load_config(page, settings)?;
    let prober = prober_for(&config);
    let mut rows = Vec::new();

    if config.is_direct_path() {
        rows.push(ResourceRow {
            technology: Technology::Vod.to_string(),
            stream: config.stream_id.clone(),
            status: "direct".into(),
            url: config.direct_url(),
        });
        println!("{}", render_rows(&rows, format));
        return Ok(());
    }

    for stream in streams(&config) {
        for technology in &config.play_order {
            let candidates = match technology {
                Technology::WebRtc => vec![config.realtime_url(&stream)],
                Technology::Hls => {
                    prober.candidates(PathTemplate::Flat, STREAMS_FOLDER, &stream, HLS_EXTENSION)
                }
                Technology::LlHls => prober.candidates(
                    PathTemplate::LowLatency,
                    &ll_hls_folder(),
                    &stream,
                    HLS_EXTENSION,
                ),
                Technology::Dash => {
                    prober.candidates(PathTemplate::Nested, STREAMS_FOLDER, &stream, DASH_EXTENSION)
                }
                Technology::Vod => {
                    let plan = VodPlan::for_stream(&stream, &config.play_types);
                    let mut urls = prober.candidates(
                        PathTemplate::Flat,
                        STREAMS_FOLDER,
                        &stream,
                        &plan.probe_extension,
                    );
                    if let Some(ref fallback) = plan.fallback {
                        urls.extend(prober.candidates(
                            PathTemplate::Flat,
                            STREAMS_FOLDER,
                            &stream,
                            fallback,
                        ));
                    }
                    urls
                }
            };

            rows.extend(candidates.into_iter().map(|url| ResourceRow {
                technology: technology.to_string(),
                stream: stream.clone(),
                status: "candidate".into(),
                url,
            }));
        }
    }

    println!("{}", render_rows(&rows, format));
    Ok(())
}

/// Probe each technology over HTTP and report what would be played
pub async fn probe(
    page: &str,
    settings: Option<&Path>,
    technology: Option<&str>,
    strict: bool,
    format: &str,
) -> anyhow::Result<()> {
    let config = load_config(page, settings)?;
    let prober = prober_for(&config);

    let technologies: Vec<Technology> = match technology {
        Some(name) => vec![name.parse::<Technology>().map_err(|e| anyhow::anyhow!(e))?],
        None => config.play_order.clone(),
    };

    let mut rows = Vec::new();
    let mut found = 0usize;

    for stream in streams(&config) {
        for technology in &technologies {
            if *technology == Technology::WebRtc {
                rows.push(ResourceRow {
                    technology: technology.to_string(),
                    stream: stream.clone(),
                    status: "not probed".into(),
                    url: config.realtime_url(&stream),
                });
                continue;
            }

            debug!(technology = %technology, stream = %stream, "Probing");
            let row = match resolve_resource(&prober, *technology, &stream, &config.play_types).await
            {
                Ok(resource) => {
                    found += 1;
                    ResourceRow {
                        technology: technology.to_string(),
                        stream: stream.clone(),
                        status: "found".into(),
                        url: resource.url,
                    }
                }
                Err(e) => ResourceRow {
                    technology: technology.to_string(),
                    stream: stream.clone(),
                    status: e.to_string(),
                    url: String::new(),
                },
            };
            rows.push(row);
        }
    }

    println!("{}", render_rows(&rows, format));
    info!(found, probed = rows.len(), "Probe finished");

    if strict && found == 0 {
        bail!("no playable resource found for {}", config.stream_id);
    }
    Ok(())
}
