pub mod backend;
pub mod config;
pub mod discovery;
pub mod fetch;
pub mod net_adapter;

pub use backend::{CancelHook, Completion, ResolverBackend};
pub use config::ConfigPort;
pub use discovery::{Discovered, WpadDiscoveryPort};
pub use fetch::FetchPort;
pub use net_adapter::NetAdapterPort;
