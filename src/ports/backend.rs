use crate::domain::{ProxyError, Result};
use url::Url;

/// Callback delivering the outcome of one resolution.
pub type Completion = Box<dyn FnOnce(Result<String>) + Send + 'static>;

/// Non-blocking request to abort an in-flight resolution.
pub type CancelHook = Box<dyn FnOnce() + Send + 'static>;

/// Capability interface shared by every resolver backend
pub trait ResolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend delivers completion itself instead of running on the worker pool
    fn is_async(&self) -> bool;

    /// Whether the backend consults proxy configuration on its own
    fn uses_system_config(&self) -> bool;

    /// Resolve `url` to a candidate list, blocking the calling thread
    fn resolve(&self, url: &Url) -> Result<String>;

    /// Start resolving `url` without blocking; `done` is invoked exactly once unless cancelled
    fn start(&self, _url: Url, _done: Completion) -> Result<CancelHook> {
        Err(ProxyError::Unsupported(format!(
            "backend {} is not asynchronous",
            self.name()
        )))
    }
}
