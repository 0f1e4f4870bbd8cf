use std::sync::Arc;

use url::Url;

use crate::adapters::pac_resolver::PacProxyResolver;
use crate::domain::Result;
use crate::ports::ResolverBackend;

/// WPAD and PAC execution, run to completion on the calling worker thread.
pub struct WpadBackend {
    pipeline: Arc<PacProxyResolver>,
}

impl WpadBackend {
    pub fn new(pipeline: Arc<PacProxyResolver>) -> Self {
        Self { pipeline }
    }
}

impl ResolverBackend for WpadBackend {
    fn name(&self) -> &'static str {
        "wpad"
    }

    fn is_async(&self) -> bool {
        false
    }

    fn uses_system_config(&self) -> bool {
        false
    }

    fn resolve(&self, url: &Url) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.pipeline.resolve(url))
    }
}
