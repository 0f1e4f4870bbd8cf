use crate::domain::Result;
use async_trait::async_trait;

/// Port for downloading PAC scripts
#[async_trait]
pub trait FetchPort: Send + Sync {
    /// Fetch the body at `url` as text
    async fn get(&self, url: &str) -> Result<String>;
}
