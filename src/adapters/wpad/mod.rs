mod cache;
pub mod dhcp;
pub mod dns;

pub use cache::WpadCache;
pub use dhcp::DhcpClient;
pub use dns::DnsDiscovery;

use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::domain::NetAdapter;
use crate::ports::{Discovered, NetAdapterPort, WpadDiscoveryPort};

/// WPAD discovery: DHCP first, then DNS suffix search.
pub struct WpadDiscovery {
    adapters: Arc<dyn NetAdapterPort>,
    dhcp: Option<DhcpClient>,
    dns: Option<DnsDiscovery>,
    fqdn: Option<String>,
}

impl WpadDiscovery {
    pub fn new(adapters: Arc<dyn NetAdapterPort>, dhcp: Option<DhcpClient>, dns: Option<DnsDiscovery>) -> Self {
        Self {
            adapters,
            dhcp,
            dns,
            fqdn: None,
        }
    }

    /// Search DNS suffixes of `fqdn` instead of the local host name.
    pub fn with_fqdn(mut self, fqdn: impl Into<String>) -> Self {
        self.fqdn = Some(fqdn.into());
        self
    }

    fn collect_adapters(&self) -> Vec<NetAdapter> {
        let mut adapters = Vec::new();
        self.adapters.for_each_adapter(&mut |adapter| {
            if adapter.can_inform() {
                adapters.push(adapter.clone());
            }
            true
        });
        adapters
    }
}

#[async_trait]
impl WpadDiscoveryPort for WpadDiscovery {
    async fn discover(&self) -> Option<Discovered> {
        if let Some(dhcp) = &self.dhcp {
            let adapters = self.collect_adapters();
            debug!("trying DHCP WPAD discovery on {} adapters", adapters.len());
            if let Some(url) = dhcp.discover(&adapters).await {
                return Some(Discovered::Url(url));
            }
        }

        if let Some(dns) = &self.dns {
            let fqdn = self.fqdn.clone().or_else(dns::local_fqdn);
            match fqdn {
                Some(fqdn) => {
                    debug!("trying DNS WPAD discovery from {}", fqdn);
                    if let Some(found) = dns.discover(&fqdn).await {
                        return Some(found);
                    }
                }
                None => debug!("no local domain name, skipping DNS WPAD discovery"),
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProxyError, Result};
    use crate::ports::FetchPort;
    use std::net::Ipv4Addr;

    struct NoAdapters;

    impl NetAdapterPort for NoAdapters {
        fn for_each_adapter(&self, _visit: &mut dyn FnMut(&NetAdapter) -> bool) {}
    }

    struct TwoAdapters;

    impl NetAdapterPort for TwoAdapters {
        fn for_each_adapter(&self, visit: &mut dyn FnMut(&NetAdapter) -> bool) {
            let first = NetAdapter {
                name: "eth0".into(),
                ipv4: Some(Ipv4Addr::new(10, 0, 0, 2)),
                ipv6: None,
                mac: [0; 6],
                dhcp_server: None,
                is_connected: true,
                is_dhcp: false,
            };
            if !visit(&first) {
                return;
            }
            let second = NetAdapter {
                name: "wlan0".into(),
                is_dhcp: true,
                ..first
            };
            visit(&second);
        }
    }

    struct ServeEverything;

    #[async_trait]
    impl FetchPort for ServeEverything {
        async fn get(&self, url: &str) -> Result<String> {
            if url.contains("wpad.") {
                Ok(format!("// from {}", url))
            } else {
                Err(ProxyError::FetchFailed(url.into()))
            }
        }
    }

    #[test]
    fn test_collect_adapters_filters_non_dhcp() {
        let discovery = WpadDiscovery::new(Arc::new(TwoAdapters), None, None);
        let adapters = discovery.collect_adapters();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].name, "wlan0");
    }

    #[tokio::test]
    async fn test_falls_back_to_dns() {
        let discovery = WpadDiscovery::new(
            Arc::new(NoAdapters),
            Some(DhcpClient::new(std::time::Duration::from_millis(10))),
            Some(DnsDiscovery::new(Arc::new(ServeEverything))),
        )
        .with_fqdn("pc.corp.example.com");

        let found = discovery.discover().await.unwrap();
        assert_eq!(found.url(), "http://wpad.corp.example.com/wpad.dat");
    }

    #[tokio::test]
    async fn test_nothing_enabled_finds_nothing() {
        let discovery = WpadDiscovery::new(Arc::new(NoAdapters), None, None);
        assert_eq!(discovery.discover().await, None);
    }
}
