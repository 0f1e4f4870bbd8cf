use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::time::Duration;
use url::Url;

use crate::domain::{ProxyError, Result};
use crate::ports::FetchPort;

pub const PAC_MIME_TYPE: &str = "application/x-ns-proxy-autoconfig";

/// PAC downloader. Never goes through a proxy itself.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    allow_https: bool,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, allow_https: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(PAC_MIME_TYPE));

        let client = reqwest::Client::builder()
            .no_proxy()
            // Resolutions may each run on their own runtime; connections must not be reused.
            .pool_max_idle_per_host(0)
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ProxyError::FetchFailed(format!("HTTP client error: {}", e)))?;

        Ok(Self { client, allow_https })
    }

    async fn read_file(url: &Url) -> Result<String> {
        let path = url
            .to_file_path()
            .map_err(|_| ProxyError::InvalidUri(format!("Invalid file URL: {}", url)))?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ProxyError::FetchFailed(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl FetchPort for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<String> {
        let parsed: Url = url.parse()?;

        match parsed.scheme() {
            "file" => return Self::read_file(&parsed).await,
            "http" => {}
            "https" if self.allow_https => {}
            "https" => {
                return Err(ProxyError::Unsupported(format!(
                    "HTTPS PAC download disabled: {}",
                    url
                )))
            }
            scheme => {
                return Err(ProxyError::Unsupported(format!(
                    "Unsupported PAC URL scheme: {}",
                    scheme
                )))
            }
        }

        debug!("GET {}", url);
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| ProxyError::FetchFailed(format!("PAC download error: {}", e)))?
            .error_for_status()
            .map_err(|e| ProxyError::FetchFailed(format!("PAC download error: {}", e)))?;

        response
            .text()
            .await
            .map_err(|e| ProxyError::FetchFailed(format!("PAC read error: {}", e)))
    }
}
