use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tracing::info;
use url::Url;

use super::bypass::should_bypass_proxy;
use super::models::DIRECT;
use super::proxy_list::convert_native_proxy_list;
use super::request::ResolutionRequest;
use super::{ProxyError, Result};
use crate::ports::{CancelHook, Completion, ConfigPort, ResolverBackend};
use crate::scheduler::ThreadPool;

/// Answer `url` from proxy settings alone, when they are enough.
///
/// A manual proxy for the URL's scheme wins, subject to the bypass list. With
/// neither auto-discovery nor an auto-config URL the answer is `direct://`.
/// `None` means a PAC script has to decide.
pub fn resolve_from_config(config: &dyn ConfigPort, url: &Url) -> Option<String> {
    if let Some(proxy) = config.get_proxy(url.scheme()) {
        let bypass = config.get_bypass_list();
        if should_bypass_proxy(url, bypass.as_deref()) {
            debug!("{} bypasses the manual proxy", url);
            return Some(DIRECT.to_string());
        }
        let list = convert_native_proxy_list(&proxy);
        if !list.is_empty() {
            return Some(list);
        }
    }

    if !config.get_auto_discover() && config.get_auto_config_url().is_none() {
        return Some(DIRECT.to_string());
    }
    None
}

struct ResolverInner {
    backend: Arc<dyn ResolverBackend>,
    config: Arc<dyn ConfigPort>,
    pool: Option<ThreadPool>,
}

/// Entry point: turns URLs into ordered proxy candidate lists.
///
/// Cloning is cheap and every clone shares the backend, configuration and
/// worker pool.
#[derive(Clone)]
pub struct ProxyResolver {
    inner: Arc<ResolverInner>,
}

impl ProxyResolver {
    /// Build a resolver around `backend`. Blocking backends get a worker pool
    /// growing from `min_threads` up to `max_threads`.
    pub fn new(
        backend: Arc<dyn ResolverBackend>,
        config: Arc<dyn ConfigPort>,
        min_threads: usize,
        max_threads: usize,
    ) -> Result<Self> {
        let pool = if backend.is_async() {
            None
        } else {
            Some(ThreadPool::new(min_threads, max_threads)?)
        };
        info!(
            "using {} backend ({})",
            backend.name(),
            if backend.is_async() { "async" } else { "pooled" }
        );

        Ok(Self {
            inner: Arc::new(ResolverInner {
                backend,
                config,
                pool,
            }),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub fn create_request(&self) -> ResolutionRequest {
        ResolutionRequest::new(self.clone())
    }

    /// Resolve one URL and return its candidate list.
    ///
    /// `None` waits indefinitely. On timeout the resolution is cancelled.
    pub fn resolve(&self, url: &str, timeout: Option<Duration>) -> Result<String> {
        let request = self.create_request();
        request.start(url)?;
        if !request.wait(timeout) {
            request.cancel();
            return Err(ProxyError::Timeout);
        }
        if let Some(err) = request.last_error() {
            return Err(err);
        }
        request
            .list()
            .ok_or_else(|| ProxyError::ScriptFailed(format!("no candidates for {}", url)))
    }

    /// Wait until every pooled resolution has finished.
    pub fn wait_idle(&self) {
        if let Some(pool) = &self.inner.pool {
            pool.wait();
        }
    }

    /// Run a resolution of `url`, delivering the outcome to `done`.
    ///
    /// Returns a hook that aborts the work, or `None` when `done` already ran.
    pub(crate) fn dispatch(&self, url: Url, done: Completion) -> Result<Option<CancelHook>> {
        let inner = &self.inner;

        if !inner.backend.uses_system_config() {
            if let Some(list) = resolve_from_config(inner.config.as_ref(), &url) {
                debug!("{} resolved from configuration: {}", url, list);
                done(Ok(list));
                return Ok(None);
            }
        }

        if inner.backend.is_async() {
            return inner.backend.start(url, done).map(Some);
        }

        let pool = inner
            .pool
            .as_ref()
            .ok_or_else(|| ProxyError::Unsupported("blocking backend without worker pool".into()))?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let backend = inner.backend.clone();
        pool.enqueue(move || {
            if flag.load(Ordering::SeqCst) {
                debug!("skipping cancelled resolution of {}", url);
                return;
            }
            done(backend.resolve(&url));
        })?;

        Ok(Some(Box::new(move || cancelled.store(true, Ordering::SeqCst))))
    }
}
