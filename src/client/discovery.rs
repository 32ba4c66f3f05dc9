//! Endpoint resolution
//!
//! Every connect attempt asks the host where its WebSocket lives
//! (`GET /api/host-info`). If that fails the static URL is used, then a URL
//! derived from the configured host and port.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::config::ServerSettings;
use crate::core::constants::{EVENTS_PATH, HOST_INFO_PATH};
use crate::core::protocol::HostInfo;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("host-info request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("host-info returned an empty wsUrl")]
    EmptyUrl,
    #[error("no discovery URL configured")]
    NotConfigured,
    #[error("no WebSocket URL available")]
    NoEndpoint,
}

#[derive(Debug, Clone)]
pub struct Discovery {
    /// Base HTTP URL of the host, without the host-info path
    discovery_url: Option<String>,
    static_url: Option<String>,
    derived_url: Option<String>,
    timeout: Duration,
}

impl Discovery {
    pub fn new(
        discovery_url: Option<String>,
        static_url: Option<String>,
        derived_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        Self {
            discovery_url: non_empty(discovery_url),
            static_url: non_empty(static_url),
            derived_url: non_empty(derived_url),
            timeout,
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Self {
        let has_host = !settings.host.trim().is_empty();
        let discovery_url = if settings.discovery_url.is_empty() && has_host {
            Some(http_base(&settings.host, settings.port, settings.secure))
        } else {
            Some(settings.discovery_url.clone())
        };
        let derived_url =
            has_host.then(|| events_url(&settings.host, settings.port, settings.secure));
        Self::new(
            discovery_url,
            Some(settings.static_url.clone()),
            derived_url,
            settings.discovery_timeout(),
        )
    }

    /// WebSocket URL for the next connect attempt
    pub fn resolve(&self) -> Result<String, DiscoveryError> {
        match self.fetch_host_info() {
            Ok(info) => {
                debug!(url = %info.ws_url, "[DISCOVERY] Host info");
                return Ok(info.ws_url);
            }
            Err(DiscoveryError::NotConfigured) => {}
            Err(e) => warn!(error = %e, "[DISCOVERY] Falling back"),
        }
        self.fallback_url().ok_or(DiscoveryError::NoEndpoint)
    }

    pub fn fetch_host_info(&self) -> Result<HostInfo, DiscoveryError> {
        let base = self
            .discovery_url
            .as_deref()
            .ok_or(DiscoveryError::NotConfigured)?;
        let url = format!("{}{}", base.trim_end_matches('/'), HOST_INFO_PATH);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let info: HostInfo = client.get(&url).send()?.error_for_status()?.json()?;
        if info.ws_url.trim().is_empty() {
            return Err(DiscoveryError::EmptyUrl);
        }
        Ok(info)
    }

    /// Static URL first, then the derived one
    pub fn fallback_url(&self) -> Option<String> {
        self.static_url.clone().or_else(|| self.derived_url.clone())
    }
}

pub fn events_url(host: &str, port: u16, secure: bool) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{}://{}:{}{}", scheme, host.trim(), port, EVENTS_PATH)
}

pub fn http_base(host: &str, port: u16, secure: bool) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{}://{}:{}", scheme, host.trim(), port)
}

// =============================================================================
// TESTS
// =============================================================================
