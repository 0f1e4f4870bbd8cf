use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use tracing::info;

use crate::domain::Result;
use crate::ports::{Discovered, FetchPort, WpadDiscoveryPort};

#[derive(Default)]
struct CacheState {
    pac_url: Option<String>,
    script: Option<String>,
    script_url: Option<String>,
    last_wpad: Option<Instant>,
    last_fetch: Option<Instant>,
}

/// Process-wide record of the last WPAD discovery and PAC download.
///
/// Both timestamps expire independently after `ttl`. The lock is only held
/// while deciding what to do and while recording results, never across a
/// discovery or fetch.
pub struct WpadCache {
    state: Mutex<CacheState>,
    ttl: Duration,
}

impl WpadCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, at: Option<Instant>) -> bool {
        at.is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Forget everything, forcing the next lookup to rediscover and refetch.
    pub fn clear(&self) {
        *self.lock() = CacheState::default();
    }

    /// The PAC URL found by the last discovery, if any.
    pub fn discovered_url(&self) -> Option<String> {
        self.lock().pac_url.clone()
    }

    async fn discover(&self, discovery: &dyn WpadDiscoveryPort) -> Option<DiscoveryOutcome> {
        {
            let state = self.lock();
            if self.is_fresh(state.last_wpad) {
                return state.pac_url.clone().map(DiscoveryOutcome::Url);
            }
        }

        let found = discovery.discover().await;

        let mut state = self.lock();
        let now = Instant::now();
        state.last_wpad = Some(now);
        match found {
            None => {
                info!("WPAD discovery found no PAC script");
                state.pac_url = None;
                None
            }
            Some(Discovered::Url(url)) => {
                info!("WPAD discovery found {}", url);
                state.pac_url = Some(url.clone());
                Some(DiscoveryOutcome::Url(url))
            }
            Some(Discovered::Script { url, script }) => {
                info!("WPAD discovery downloaded {} ({} bytes)", url, script.len());
                state.pac_url = Some(url.clone());
                state.script_url = Some(url);
                state.script = Some(script.clone());
                state.last_fetch = Some(now);
                Some(DiscoveryOutcome::Script(script))
            }
        }
    }

    /// Return the PAC script to run, or `None` when no script applies.
    ///
    /// An explicit `auto_config_url` skips discovery. Fetch failures are
    /// returned as errors; an empty discovery is not an error.
    pub async fn pac_script(
        &self,
        auto_config_url: Option<String>,
        auto_discover: bool,
        discovery: &dyn WpadDiscoveryPort,
        fetcher: &dyn FetchPort,
    ) -> Result<Option<String>> {
        let url = match auto_config_url {
            Some(url) => url,
            None if !auto_discover => return Ok(None),
            None => match self.discover(discovery).await {
                None => return Ok(None),
                Some(DiscoveryOutcome::Script(script)) => return Ok(Some(script)),
                Some(DiscoveryOutcome::Url(url)) => url,
            },
        };

        {
            let state = self.lock();
            if state.script_url.as_deref() == Some(url.as_str()) && self.is_fresh(state.last_fetch) {
                if let Some(script) = &state.script {
                    debug!("using cached PAC script from {}", url);
                    return Ok(Some(script.clone()));
                }
            }
        }

        debug!("attempting to download PAC file at {}", url);
        let script = fetcher.get(&url).await?;
        info!("loaded PAC file from {} ({} bytes)", url, script.len());

        let mut state = self.lock();
        state.script_url = Some(url);
        state.script = Some(script.clone());
        state.last_fetch = Some(Instant::now());
        Ok(Some(script))
    }
}

enum DiscoveryOutcome {
    Url(String),
    Script(String),
}

impl Default for WpadCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
