#![cfg(test)]
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_dhcp;
pub mod pac_server;

pub use fake_dhcp::FakeDhcpServer;
pub use pac_server::{create_pac_script, TestPacServer};
