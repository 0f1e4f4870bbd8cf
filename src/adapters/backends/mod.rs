//! The interchangeable resolver backends.

mod env;
mod pooled;
mod runtime;

pub use env::EnvBackend;
pub use pooled::WpadBackend;
pub use runtime::TokioBackend;

use std::sync::Arc;

use tokio::runtime::Handle;
use url::Url;

use crate::adapters::pac_resolver::PacProxyResolver;
use crate::domain::{BackendKind, ProxyError, Result, Settings};
use crate::ports::{CancelHook, Completion, ConfigPort, ResolverBackend};

pub enum Backend {
    Wpad(WpadBackend),
    Tokio(TokioBackend),
    Env(EnvBackend),
}

impl Backend {
    /// Build the backend named by `settings.backend`.
    ///
    /// The tokio backend runs on `handle`, or on the current runtime when none
    /// is given.
    pub fn from_settings(
        settings: &Settings,
        config: Arc<dyn ConfigPort>,
        handle: Option<Handle>,
    ) -> Result<Self> {
        let backend = match settings.backend {
            BackendKind::Wpad => {
                let pipeline = PacProxyResolver::from_settings(config, settings)?;
                Backend::Wpad(WpadBackend::new(Arc::new(pipeline)))
            }
            BackendKind::Tokio => {
                let handle = match handle {
                    Some(handle) => handle,
                    None => Handle::try_current().map_err(|e| {
                        ProxyError::Config(format!("tokio backend needs a runtime: {}", e))
                    })?,
                };
                let pipeline = PacProxyResolver::from_settings(config, settings)?;
                Backend::Tokio(TokioBackend::new(Arc::new(pipeline), handle))
            }
            BackendKind::Env => Backend::Env(EnvBackend::with_config(config)),
        };
        Ok(backend)
    }

    fn inner(&self) -> &dyn ResolverBackend {
        match self {
            Backend::Wpad(backend) => backend,
            Backend::Tokio(backend) => backend,
            Backend::Env(backend) => backend,
        }
    }
}

impl ResolverBackend for Backend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn is_async(&self) -> bool {
        self.inner().is_async()
    }

    fn uses_system_config(&self) -> bool {
        self.inner().uses_system_config()
    }

    fn resolve(&self, url: &Url) -> Result<String> {
        self.inner().resolve(url)
    }

    fn start(&self, url: Url, done: Completion) -> Result<CancelHook> {
        self.inner().start(url, done)
    }
}
