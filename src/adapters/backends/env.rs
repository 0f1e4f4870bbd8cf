use std::sync::Arc;

use url::Url;

use crate::adapters::config::EnvConfig;
use crate::domain::service::resolve_from_config;
use crate::domain::{Result, DIRECT};
use crate::ports::{ConfigPort, ResolverBackend};

/// Answers from proxy environment variables only. Never runs a PAC script.
pub struct EnvBackend {
    config: Arc<dyn ConfigPort>,
}

impl EnvBackend {
    pub fn new() -> Self {
        Self::with_config(Arc::new(EnvConfig::new()))
    }

    /// Answer from `config`, usually the resolver's own so overrides apply.
    pub fn with_config(config: Arc<dyn ConfigPort>) -> Self {
        Self { config }
    }
}

impl Default for EnvBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverBackend for EnvBackend {
    fn name(&self) -> &'static str {
        "env"
    }

    fn is_async(&self) -> bool {
        false
    }

    fn uses_system_config(&self) -> bool {
        true
    }

    fn resolve(&self, url: &Url) -> Result<String> {
        Ok(resolve_from_config(self.config.as_ref(), url).unwrap_or_else(|| DIRECT.to_string()))
    }
}
