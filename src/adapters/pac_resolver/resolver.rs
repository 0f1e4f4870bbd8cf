use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tracing::info;
use url::Url;

use crate::adapters::net_adapter::NetdevAdapters;
use crate::adapters::reqwest_client::ReqwestFetcher;
use crate::adapters::sandbox;
use crate::adapters::wpad::{DhcpClient, DnsDiscovery, WpadCache, WpadDiscovery};
use crate::domain::{convert_proxy_list_to_uri_list, ProxyError, Result, Settings, DIRECT};
use crate::ports::{ConfigPort, FetchPort, WpadDiscoveryPort};

/// WPAD discovery, PAC download and script execution for one URL.
pub struct PacProxyResolver {
    config: Arc<dyn ConfigPort>,
    cache: Arc<WpadCache>,
    discovery: Arc<dyn WpadDiscoveryPort>,
    fetcher: Arc<dyn FetchPort>,
}

impl PacProxyResolver {
    pub fn new(
        config: Arc<dyn ConfigPort>,
        cache: Arc<WpadCache>,
        discovery: Arc<dyn WpadDiscoveryPort>,
        fetcher: Arc<dyn FetchPort>,
    ) -> Self {
        Self {
            config,
            cache,
            discovery,
            fetcher,
        }
    }

    /// Wire the real collaborators: reqwest fetcher, netdev adapters, DHCP and DNS discovery.
    pub fn from_settings(config: Arc<dyn ConfigPort>, settings: &Settings) -> Result<Self> {
        let fetcher: Arc<dyn FetchPort> = Arc::new(ReqwestFetcher::new(
            Duration::from_secs(settings.fetch_timeout_secs),
            settings.allow_https_fetch,
        )?);

        let dhcp = settings
            .dhcp_discovery
            .then(|| DhcpClient::new(Duration::from_millis(settings.dhcp_timeout_ms)));
        let dns = settings
            .dns_discovery
            .then(|| DnsDiscovery::new(fetcher.clone()));
        let discovery = WpadDiscovery::new(Arc::new(NetdevAdapters::new()), dhcp, dns);

        let cache = WpadCache::new(Duration::from_secs(settings.wpad_ttl_secs));

        Ok(Self::new(config, Arc::new(cache), Arc::new(discovery), fetcher))
    }

    pub fn cache(&self) -> &WpadCache {
        &self.cache
    }

    /// Resolve `url` to a comma-joined candidate list.
    ///
    /// Finding no PAC script is not an error and yields `direct://`.
    pub async fn resolve(&self, url: &Url) -> Result<String> {
        let script = self
            .cache
            .pac_script(
                self.config.get_auto_config_url(),
                self.config.get_auto_discover(),
                self.discovery.as_ref(),
                self.fetcher.as_ref(),
            )
            .await?;

        let Some(script) = script else {
            debug!("no PAC script for {}, going direct", url);
            return Ok(DIRECT.to_string());
        };

        let target = url.clone();
        let raw = tokio::task::spawn_blocking(move || sandbox::find_proxy_for_url(&script, &target))
            .await
            .map_err(|e| ProxyError::ScriptFailed(format!("script task failed: {}", e)))??;

        let list = convert_proxy_list_to_uri_list(&raw, None);
        if list.is_empty() {
            debug!("PAC script returned no candidates for {}, going direct", url);
            return Ok(DIRECT.to_string());
        }
        info!("resolved {} to {}", url, list);
        Ok(list)
    }
}
