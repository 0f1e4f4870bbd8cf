use log::debug;

use crate::domain::NetAdapter;
use crate::ports::NetAdapterPort;

/// Adapter enumeration backed by `netdev`.
///
/// `netdev` does not report lease state, so every non-loopback interface with
/// an IPv4 address is treated as DHCP-configured and INFORM is broadcast.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetdevAdapters;

impl NetdevAdapters {
    pub fn new() -> Self {
        Self
    }

    fn to_adapter(interface: &netdev::Interface) -> NetAdapter {
        let ipv4 = interface.ipv4.first().map(|net| net.addr());
        NetAdapter {
            name: interface.name.clone(),
            ipv4,
            ipv6: interface.ipv6.first().map(|net| net.addr()),
            mac: interface.mac_addr.as_ref().map(|mac| mac.octets()).unwrap_or_default(),
            dhcp_server: None,
            is_connected: interface.is_up(),
            is_dhcp: !interface.is_loopback() && ipv4.is_some(),
        }
    }
}

impl NetAdapterPort for NetdevAdapters {
    fn for_each_adapter(&self, visit: &mut dyn FnMut(&NetAdapter) -> bool) {
        for interface in netdev::get_interfaces() {
            if !interface.is_up() {
                continue;
            }
            let adapter = Self::to_adapter(&interface);
            debug!("found adapter {} ({:?})", adapter.name, adapter.ipv4);
            if !visit(&adapter) {
                break;
            }
        }
    }
}

/// Addresses of every connected, non-loopback adapter.
pub fn local_addresses(adapters: &dyn NetAdapterPort) -> Vec<std::net::IpAddr> {
    let mut addresses = Vec::new();
    adapters.for_each_adapter(&mut |adapter| {
        if let Some(ip) = adapter.ipv4.filter(|ip| !ip.is_loopback()) {
            addresses.push(ip.into());
        }
        if let Some(ip) = adapter.ipv6.filter(|ip| !ip.is_loopback()) {
            addresses.push(ip.into());
        }
        true
    });
    addresses
}
