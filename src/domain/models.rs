use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use url::Url;

use super::{ProxyError, Result};

/// Literal candidate meaning "connect without a proxy".
pub const DIRECT: &str = "direct://";

/// A typed view over one candidate of a resolved list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoute {
    Direct,
    Upstream { proxy_url: Url },
}

impl std::fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyRoute::Direct => write!(f, "direct"),
            ProxyRoute::Upstream { proxy_url } => write!(f, "upstream {}", proxy_url),
        }
    }
}

impl ProxyRoute {
    pub fn scheme(&self) -> &str {
        match self {
            ProxyRoute::Direct => "direct",
            ProxyRoute::Upstream { proxy_url } => proxy_url.scheme(),
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, ProxyRoute::Direct)
    }

    /// Parse a single `scheme://host[:port]` candidate.
    pub fn parse(candidate: &str) -> Result<Self> {
        let candidate = candidate.trim();
        if candidate.eq_ignore_ascii_case(DIRECT) {
            return Ok(ProxyRoute::Direct);
        }
        let proxy_url: Url = candidate
            .parse()
            .map_err(|e| ProxyError::InvalidUri(format!("Invalid proxy URL {}: {}", candidate, e)))?;
        if proxy_url.host_str().is_none() {
            return Err(ProxyError::InvalidUri(format!("Proxy URL without host: {}", candidate)));
        }
        Ok(ProxyRoute::Upstream { proxy_url })
    }

    /// Parse a comma-delimited candidate list, keeping its order.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Self::parse)
            .collect()
    }
}

/// A connected network interface as reported by the adapter collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAdapter {
    pub name: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub mac: [u8; 6],
    pub dhcp_server: Option<Ipv4Addr>,
    pub is_connected: bool,
    pub is_dhcp: bool,
}

impl NetAdapter {
    /// Whether a DHCPINFORM can sensibly be sent from this adapter.
    pub fn can_inform(&self) -> bool {
        self.is_connected
            && self.is_dhcp
            && self
                .ipv4
                .map(|ip| !ip.is_unspecified() && !ip.is_broadcast())
                .unwrap_or(false)
    }
}

/// The closed set of resolver backends. Chosen once when the resolver is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// WPAD discovery and script execution dispatched onto the worker pool.
    #[default]
    Wpad,
    /// The same pipeline driven natively on a tokio runtime.
    Tokio,
    /// Environment variables only; never runs scripts.
    Env,
}

impl FromStr for BackendKind {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wpad" => Ok(BackendKind::Wpad),
            "tokio" => Ok(BackendKind::Tokio),
            "env" => Ok(BackendKind::Env),
            other => Err(ProxyError::Config(format!("unknown backend {}", other))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Wpad => write!(f, "wpad"),
            BackendKind::Tokio => write!(f, "tokio"),
            BackendKind::Env => write!(f, "env"),
        }
    }
}

/// On-disk settings, loaded through confy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendKind,
    pub auto_discover: Option<bool>,
    pub auto_config_url: Option<String>,
    pub proxy: Option<String>,
    pub bypass_list: Option<String>,
    pub wpad_ttl_secs: u64,
    pub dhcp_timeout_ms: u64,
    pub fetch_timeout_secs: u64,
    pub allow_https_fetch: bool,
    pub dhcp_discovery: bool,
    pub dns_discovery: bool,
    pub pool_min_threads: usize,
    pub pool_max_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Wpad,
            auto_discover: None,
            auto_config_url: None,
            proxy: None,
            bypass_list: None,
            wpad_ttl_secs: 300,
            dhcp_timeout_ms: 3000,
            fetch_timeout_secs: 10,
            allow_https_fetch: true,
            dhcp_discovery: true,
            dns_discovery: true,
            pool_min_threads: 0,
            pool_max_threads: 4,
        }
    }
}
