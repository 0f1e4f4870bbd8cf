use std::sync::Arc;

use log::debug;
use tokio::runtime::Handle;
use url::Url;

use crate::adapters::pac_resolver::PacProxyResolver;
use crate::domain::{ProxyError, Result};
use crate::ports::{CancelHook, Completion, ResolverBackend};

/// The WPAD pipeline spawned as a task on an existing tokio runtime.
///
/// Completions are delivered from the runtime's threads. Cancelling aborts
/// the task at its next await point.
pub struct TokioBackend {
    pipeline: Arc<PacProxyResolver>,
    handle: Handle,
}

impl TokioBackend {
    pub fn new(pipeline: Arc<PacProxyResolver>, handle: Handle) -> Self {
        Self { pipeline, handle }
    }
}

impl ResolverBackend for TokioBackend {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn is_async(&self) -> bool {
        true
    }

    fn uses_system_config(&self) -> bool {
        false
    }

    fn resolve(&self, url: &Url) -> Result<String> {
        if Handle::try_current().is_ok() {
            return Err(ProxyError::Unsupported(
                "blocking resolve called from inside a tokio runtime".into(),
            ));
        }
        self.handle.block_on(self.pipeline.resolve(url))
    }

    fn start(&self, url: Url, done: Completion) -> Result<CancelHook> {
        let pipeline = self.pipeline.clone();
        let task = self.handle.spawn(async move { pipeline.resolve(&url).await });
        let abort = task.abort_handle();

        self.handle.spawn(async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    Err(ProxyError::ScriptFailed("resolution task panicked".into()))
                }
                Err(_) => Err(ProxyError::Cancelled),
            };
            done(result);
        });

        Ok(Box::new(move || {
            debug!("aborting resolution task");
            abort.abort();
        }))
    }
}
