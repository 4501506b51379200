//! Security query parameters appended to every resource request

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::form_urlencoded;

/// Credentials forwarded to the media server as query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityParams {
    /// Playback token
    pub token: Option<String>,
    /// Subscriber id for time-based tokens
    pub subscriber_id: Option<String>,
    /// Subscriber code (TOTP)
    pub subscriber_code: Option<String>,
    /// Start of the requested time range
    pub start: Option<String>,
    /// End of the requested time range
    pub end: Option<String>,
}

impl SecurityParams {
    /// Present parameters in wire order
    fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("token", self.token.as_deref()),
            ("subscriberId", self.subscriber_id.as_deref()),
            ("subscriberCode", self.subscriber_code.as_deref()),
            ("start", self.start.as_deref()),
            ("end", self.end.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    }

    /// True when no parameter is set
    pub fn is_empty(&self) -> bool {
        self.pairs().next().is_none()
    }

    /// `key=value` pairs joined by `&`, without a leading separator
    pub fn query_string(&self) -> String {
        self.pairs()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append the query string to a resource URL
    pub fn append_to(&self, url: &str) -> String {
        let query = self.query_string();
        if query.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, query)
    }

    /// Append each parameter whose key is not already present in `uri`.
    ///
    /// Used on sub-requests issued by an engine, which may or may not carry
    /// parameters inherited from the playlist URL.
    pub fn inject_missing(&self, uri: &str) -> String {
        let query = uri
            .split_once('?')
            .map(|(_, query)| query.split('#').next().unwrap_or_default())
            .unwrap_or_default();
        let present: HashSet<String> = form_urlencoded::parse(query.as_bytes())
            .map(|(key, _)| key.into_owned())
            .collect();

        let missing: Vec<String> = self
            .pairs()
            .filter(|(key, _)| !present.contains(*key))
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        if missing.is_empty() {
            return uri.to_string();
        }
        let separator = if uri.contains('?') { '&' } else { '?' };
        format!("{}{}{}", uri, separator, missing.join("&"))
    }

    /// Append the whole query string unless `uri` already contains it
    pub fn inject_whole(&self, uri: &str) -> String {
        let query = self.query_string();
        if query.is_empty() || uri.contains(&query) {
            return uri.to_string();
        }
        if uri.ends_with('?') {
            format!("{}{}", uri, query)
        } else {
            self.append_to(uri)
        }
    }
}
