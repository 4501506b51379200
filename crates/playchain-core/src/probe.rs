//! Resource existence probing
//!
//! Before an HTTP technology is started the prober checks, with at most two
//! HEAD requests, that a playlist or file exists: first under the adaptive
//! naming (`{id}_adaptive.{ext}`), then under the plain naming.

use crate::config::SecurityParams;
use crate::types::{LL_HLS_FOLDER, STREAMS_FOLDER};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Naming suffix of adaptive (multi-bitrate) resources
pub const ADAPTIVE_SUFFIX: &str = "_adaptive";

/// Naming suffix of low-latency master playlists
pub const LL_MASTER_SUFFIX: &str = "__master";

/// Lightweight existence check for a resource URL
#[async_trait]
pub trait ExistenceCheck: Send + Sync {
    /// `Ok(true)` when the resource answers with status 200
    async fn exists(&self, url: &str) -> Result<bool>;
}

/// HEAD-request existence check
#[derive(Debug, Clone, Default)]
pub struct HttpExistenceCheck {
    client: Client,
}

impl HttpExistenceCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExistenceCheck for HttpExistenceCheck {
    async fn exists(&self, url: &str) -> Result<bool> {
        let response = self.client.head(url).send().await?;
        debug!(url = %url, status = response.status().as_u16(), "HEAD probe");
        Ok(response.status() == StatusCode::OK)
    }
}

/// Path layout used to build candidate URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTemplate {
    /// `{folder}/{id}.{ext}`
    Flat,
    /// `{folder}/{id}/{id}__master.{ext}`
    LowLatency,
    /// `{folder}/{id}/{id}.{ext}`
    Nested,
}

impl PathTemplate {
    /// Template selected by the folder a caller asks for
    pub fn for_folder(folder: &str) -> Self {
        if folder.trim_end_matches('/').ends_with(LL_HLS_FOLDER) {
            PathTemplate::LowLatency
        } else {
            PathTemplate::Flat
        }
    }
}

/// Folder argument for low-latency playlists
pub fn ll_hls_folder() -> String {
    format!("{}/{}", STREAMS_FOLDER, LL_HLS_FOLDER)
}

/// Checks candidate resource paths against the content origin
#[derive(Clone)]
pub struct ResourceProber {
    base_url: String,
    security: SecurityParams,
    check: Arc<dyn ExistenceCheck>,
}

impl ResourceProber {
    pub fn new(
        base_url: impl Into<String>,
        security: SecurityParams,
        check: Arc<dyn ExistenceCheck>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            security,
            check,
        }
    }

    /// Candidate URLs in probe order, security parameters included
    pub fn candidates(
        &self,
        template: PathTemplate,
        folder: &str,
        stream_id: &str,
        extension: &str,
    ) -> Vec<String> {
        let folder = folder.trim_end_matches('/');
        let mut stem = self.base_url.clone();
        if !stream_id.starts_with(&format!("{}/", folder)) {
            stem.push_str(folder);
            stem.push('/');
        }

        if extension.is_empty() {
            // the id already names the file
            stem.push_str(stream_id);
            return vec![self.security.append_to(&stem)];
        }

        match template {
            PathTemplate::Flat => stem.push_str(stream_id),
            PathTemplate::LowLatency => {
                stem.push_str(&format!("{0}/{0}{1}", stream_id, LL_MASTER_SUFFIX))
            }
            PathTemplate::Nested => stem.push_str(&format!("{0}/{0}", stream_id)),
        }

        [
            format!("{}{}.{}", stem, ADAPTIVE_SUFFIX, extension),
            format!("{}.{}", stem, extension),
        ]
        .iter()
        .map(|path| self.security.append_to(path))
        .collect()
    }

    /// Resolve the first existing candidate for a flat or low-latency resource.
    ///
    /// The template is selected from `folder`.
    #[instrument(skip(self))]
    pub async fn probe(&self, folder: &str, stream_id: &str, extension: &str) -> Result<String> {
        self.probe_with(PathTemplate::for_folder(folder), folder, stream_id, extension)
            .await
    }

    /// Resolve the first existing candidate under `{folder}/{id}/{id}`
    #[instrument(skip(self))]
    pub async fn probe_nested(
        &self,
        folder: &str,
        stream_id: &str,
        extension: &str,
    ) -> Result<String> {
        self.probe_with(PathTemplate::Nested, folder, stream_id, extension)
            .await
    }

    async fn probe_with(
        &self,
        template: PathTemplate,
        folder: &str,
        stream_id: &str,
        extension: &str,
    ) -> Result<String> {
        for candidate in self.candidates(template, folder, stream_id, extension) {
            match self.check.exists(&candidate).await {
                Ok(true) => {
                    debug!(url = %candidate, "Resource found");
                    return Ok(candidate);
                }
                Ok(false) => debug!(url = %candidate, "Resource not found"),
                Err(e) => warn!(url = %candidate, error = %e, "Existence check failed"),
            }
        }

        warn!(stream_id = %stream_id, extension = %extension, "No stream found");
        Err(Error::ResourceNotAvailable)
    }
}
