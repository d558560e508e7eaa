use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::bindings::ConfigError;

/// A validated WebSocket URL. Reconnects always reuse the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(invalid(&format!("unsupported scheme '{}'", other))),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
        Ok(Self { url })
    }

    /// Builds `ws://host:port/path`.
    pub fn from_parts(host: &str, port: u16, path: &str) -> Result<Self, ConfigError> {
        let path = path.trim();
        let separator = if path.starts_with('/') { "" } else { "/" };
        Self::parse(&format!("ws://{}:{}{}{}", host, port, separator, path))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
