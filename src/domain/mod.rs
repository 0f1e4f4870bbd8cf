pub mod bypass;
pub mod errors;
pub mod models;
pub mod proxy_list;
pub mod request;
pub mod service;

pub use bypass::{is_ipv4_in_cidr_range, is_ipv6_in_cidr_range, should_bypass_proxy};
pub use errors::*;
pub use models::*;
pub use proxy_list::{convert_native_proxy_list, convert_proxy_list_to_uri_list};
pub use request::ResolutionRequest;
pub use service::ProxyResolver;
