//! Page location of the host document

use crate::Result;
use serde::{Deserialize, Serialize};
use url::Url;

/// The parts of a page location the resolver reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// Query string including the leading `?`
    pub search: String,
    /// Path of the embedding page
    pub pathname: String,
    /// Scheme with trailing colon, e.g. `https:`
    pub protocol: String,
    pub hostname: String,
    /// Empty when the default port is used
    pub port: String,
}

impl PageLocation {
    /// Build a location from a full page URL
    pub fn from_url(url: &Url) -> Self {
        Self {
            search: url.query().map(|q| format!("?{}", q)).unwrap_or_default(),
            pathname: url.path().to_string(),
            protocol: format!("{}:", url.scheme()),
            hostname: url.host_str().unwrap_or_default().to_string(),
            port: url.port().map(|p| p.to_string()).unwrap_or_default(),
        }
    }

    /// Parse a page URL string
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self::from_url(&Url::parse(url)?))
    }

    /// First non-empty value of a query parameter
    pub fn param(&self, key: &str) -> Option<String> {
        let query = self.search.trim_start_matches('?');
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    /// True when the page was served over TLS
    pub fn is_secure(&self) -> bool {
        self.protocol.starts_with("https")
    }

    /// Host with the port appended when one is set
    pub fn host(&self) -> String {
        if self.port.is_empty() {
            self.hostname.clone()
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }

    /// Directory of the page path, always starting and ending with `/`
    pub fn application_path(&self) -> String {
        let mut app = match self.pathname.rfind('/') {
            Some(idx) => self.pathname[..=idx].to_string(),
            None => "/".to_string(),
        };
        if !app.starts_with('/') {
            app.insert(0, '/');
        }
        if !app.ends_with('/') {
            app.push('/');
        }
        app
    }
}
