pub mod backends;
pub mod config;
pub mod net_adapter;
pub mod pac_resolver;
pub mod reqwest_client;
pub mod sandbox;
pub mod wpad;

pub use backends::{Backend, EnvBackend, TokioBackend, WpadBackend};
pub use config::{EnvConfig, OverrideConfig};
pub use net_adapter::NetdevAdapters;
pub use pac_resolver::PacProxyResolver;
pub use reqwest_client::ReqwestFetcher;
pub use wpad::{WpadCache, WpadDiscovery};
