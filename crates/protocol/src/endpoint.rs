//! Agent endpoint addressing.
//!
//! Agents are reached through the same origin that serves the control
//! plane: `<ws|wss>://<host>/api/ws/agent/<token>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::AGENT_WS_PATH;

/// Errors from parsing an origin string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OriginError {
    #[error("unsupported scheme in origin: {0}")]
    UnsupportedScheme(String),

    #[error("origin has no host: {0}")]
    MissingHost(String),
}

/// Scheme and authority of the control-plane origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin {
    /// `true` for `https`/`wss` origins.
    pub secure: bool,
    /// `host[:port]`.
    pub host: String,
}

impl Origin {
    pub fn new(secure: bool, host: impl Into<String>) -> Self {
        Self {
            secure,
            host: host.into(),
        }
    }

    /// Parses `http://host:port`, `https://host`, `ws://...` or `wss://...`.
    ///
    /// Any path, query or fragment after the authority is ignored.
    pub fn parse(s: &str) -> Result<Self, OriginError> {
        let s = s.trim();
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| OriginError::UnsupportedScheme(s.to_string()))?;

        let secure = match scheme.to_ascii_lowercase().as_str() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            _ => return Err(OriginError::UnsupportedScheme(scheme.to_string())),
        };

        let host = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        if host.is_empty() {
            return Err(OriginError::MissingHost(s.to_string()));
        }

        Ok(Self::new(secure, host))
    }

    /// WebSocket scheme mirroring the origin's security.
    pub fn ws_scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Builds the agent WebSocket URL carrying `token`.
    pub fn agent_url(&self, token: &str) -> String {
        format!(
            "{}://{}{}{}",
            self.ws_scheme(),
            self.host,
            AGENT_WS_PATH,
            token
        )
    }
}

impl Default for Origin {
    fn default() -> Self {
        Self::new(false, "127.0.0.1:8080")
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        write!(f, "{scheme}://{}", self.host)
    }
}

impl FromStr for Origin {
    type Err = OriginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Origin {
    type Error = OriginError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.to_string()
    }
}
