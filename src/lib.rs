//! Proxy auto-configuration: decides which proxy, if any, to use for a URL.
//!
//! Proxy settings, WPAD discovery (DHCP option 252, then DNS) and PAC script
//! execution are combined behind [`domain::ProxyResolver`], which hands out
//! ordered candidate lists such as `http://proxy:8080,direct://`.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod scheduler;
