use async_trait::async_trait;

/// Outcome of a successful WPAD discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    /// A PAC script URL, still to be fetched (DHCP)
    Url(String),
    /// A PAC script already downloaded while probing (DNS)
    Script { url: String, script: String },
}

impl Discovered {
    pub fn url(&self) -> &str {
        match self {
            Discovered::Url(url) => url,
            Discovered::Script { url, .. } => url,
        }
    }
}

/// Port for locating a PAC script on the local network
#[async_trait]
pub trait WpadDiscoveryPort: Send + Sync {
    /// Run discovery once; `None` means nothing was found
    async fn discover(&self) -> Option<Discovered>;
}
