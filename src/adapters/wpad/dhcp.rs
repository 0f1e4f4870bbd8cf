//! DHCPINFORM exchange for WPAD (option 252).
//!
//! BOOTP fixed header layout, all multi-byte fields big-endian:
//!
//! ```text
//! off  len  field
//!   0    1  op      1 = BOOTREQUEST, 2 = BOOTREPLY
//!   1    1  htype   1 = ethernet
//!   2    1  hlen    6
//!   3    1  hops
//!   4    4  xid     transaction id
//!   8    2  secs
//!  10    2  flags
//!  12    4  ciaddr  client address
//!  16    4  yiaddr
//!  20    4  siaddr
//!  24    4  giaddr
//!  28   16  chaddr  client hardware address
//!  44   64  sname
//! 108  128  file
//! 236    4  magic cookie 63 82 53 63
//! 240    -  options (code, len, data) ... 255
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::{debug, info};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::domain::{NetAdapter, ProxyError, Result};

pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;
pub const HTYPE_ETHERNET: u8 = 1;
pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

pub const OPTION_PAD: u8 = 0;
pub const OPTION_MESSAGE_TYPE: u8 = 53;
pub const OPTION_PARAMETER_REQUEST_LIST: u8 = 55;
pub const OPTION_WPAD: u8 = 252;
pub const OPTION_END: u8 = 255;

pub const DHCPINFORM: u8 = 8;

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;

const HEADER_LEN: usize = 236;
const MAX_MESSAGE_LEN: usize = 1500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpOption {
    pub code: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub sname: [u8; 64],
    pub file: [u8; 128],
    pub options: Vec<DhcpOption>,
}

impl DhcpMessage {
    /// A DHCPINFORM asking only for the WPAD option.
    pub fn inform(xid: u32, ciaddr: Ipv4Addr, mac: [u8; 6]) -> Self {
        let mut chaddr = [0u8; 16];
        chaddr[..6].copy_from_slice(&mac);
        Self {
            op: BOOTREQUEST,
            htype: HTYPE_ETHERNET,
            hlen: 6,
            hops: 0,
            xid,
            secs: 0,
            flags: 0,
            ciaddr,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            sname: [0; 64],
            file: [0; 128],
            options: vec![
                DhcpOption {
                    code: OPTION_MESSAGE_TYPE,
                    data: vec![DHCPINFORM],
                },
                DhcpOption {
                    code: OPTION_PARAMETER_REQUEST_LIST,
                    data: vec![OPTION_WPAD],
                },
            ],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + 4 + 16);
        buf.push(self.op);
        buf.push(self.htype);
        buf.push(self.hlen);
        buf.push(self.hops);
        buf.extend_from_slice(&self.xid.to_be_bytes());
        buf.extend_from_slice(&self.secs.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.ciaddr.octets());
        buf.extend_from_slice(&self.yiaddr.octets());
        buf.extend_from_slice(&self.siaddr.octets());
        buf.extend_from_slice(&self.giaddr.octets());
        buf.extend_from_slice(&self.chaddr);
        buf.extend_from_slice(&self.sname);
        buf.extend_from_slice(&self.file);
        buf.extend_from_slice(&MAGIC_COOKIE);
        for option in &self.options {
            if option.data.is_empty() {
                buf.extend_from_slice(&[option.code, 0]);
                continue;
            }
            // Data over 255 bytes goes out as consecutive instances of the option.
            for chunk in option.data.chunks(u8::MAX as usize) {
                buf.push(option.code);
                buf.push(chunk.len() as u8);
                buf.extend_from_slice(chunk);
            }
        }
        buf.push(OPTION_END);
        buf
    }

    /// Decode a message. Options are scanned linearly up to the END option;
    /// PAD bytes are skipped and every other option is kept by length.
    /// Repeated instances of one option are concatenated.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN + MAGIC_COOKIE.len() {
            return Err(ProxyError::DiscoveryFailed(format!(
                "DHCP message too short ({} bytes)",
                buf.len()
            )));
        }
        if buf[HEADER_LEN..HEADER_LEN + 4] != MAGIC_COOKIE {
            return Err(ProxyError::DiscoveryFailed("bad DHCP magic cookie".into()));
        }

        let addr = |at: usize| Ipv4Addr::new(buf[at], buf[at + 1], buf[at + 2], buf[at + 3]);
        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&buf[28..44]);
        let mut sname = [0u8; 64];
        sname.copy_from_slice(&buf[44..108]);
        let mut file = [0u8; 128];
        file.copy_from_slice(&buf[108..236]);

        let mut options = Vec::new();
        let mut at = HEADER_LEN + 4;
        while at < buf.len() {
            let code = buf[at];
            at += 1;
            match code {
                OPTION_PAD => continue,
                OPTION_END => break,
                _ => {}
            }
            let Some(&len) = buf.get(at) else {
                return Err(ProxyError::DiscoveryFailed("truncated DHCP option".into()));
            };
            at += 1;
            let end = at + len as usize;
            if end > buf.len() {
                return Err(ProxyError::DiscoveryFailed(format!(
                    "DHCP option {} overruns message",
                    code
                )));
            }
            let data = &buf[at..end];
            match options.iter().position(|option: &DhcpOption| option.code == code) {
                Some(index) => options[index].data.extend_from_slice(data),
                None => options.push(DhcpOption {
                    code,
                    data: data.to_vec(),
                }),
            }
            at = end;
        }

        Ok(Self {
            op: buf[0],
            htype: buf[1],
            hlen: buf[2],
            hops: buf[3],
            xid: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            secs: u16::from_be_bytes([buf[8], buf[9]]),
            flags: u16::from_be_bytes([buf[10], buf[11]]),
            ciaddr: addr(12),
            yiaddr: addr(16),
            siaddr: addr(20),
            giaddr: addr(24),
            chaddr,
            sname,
            file,
            options,
        })
    }

    pub fn option(&self, code: u8) -> Option<&[u8]> {
        self.options
            .iter()
            .find(|option| option.code == code)
            .map(|option| option.data.as_slice())
    }

    /// WPAD URL carried in option 252, without trailing NULs or whitespace.
    pub fn wpad_url(&self) -> Option<String> {
        let raw = self.option(OPTION_WPAD)?;
        let url = String::from_utf8_lossy(raw)
            .trim_end_matches('\0')
            .trim()
            .to_string();
        (!url.is_empty()).then_some(url)
    }

    /// Whether this is a reply to a request with transaction id `xid`.
    pub fn answers(&self, xid: u32) -> bool {
        self.op == BOOTREPLY && self.xid == xid
    }
}

fn new_transaction_id() -> u32 {
    uuid::Uuid::new_v4().as_u128() as u32
}

fn bind_socket(ip: Ipv4Addr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::V4(SocketAddrV4::new(ip, port)).into())?;
    UdpSocket::from_std(socket.into())
}

/// Sends DHCPINFORM messages from each adapter until one yields a WPAD URL.
#[derive(Debug, Clone)]
pub struct DhcpClient {
    timeout: Duration,
    client_port: u16,
    server_port: u16,
}

impl DhcpClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client_port: CLIENT_PORT,
            server_port: SERVER_PORT,
        }
    }

    /// Use non-standard ports, e.g. to talk to a server on loopback.
    pub fn with_ports(mut self, client_port: u16, server_port: u16) -> Self {
        self.client_port = client_port;
        self.server_port = server_port;
        self
    }

    async fn open_socket(&self, ip: Ipv4Addr) -> Result<UdpSocket> {
        match bind_socket(ip, self.client_port) {
            Ok(socket) => Ok(socket),
            Err(e) => {
                debug!(
                    "cannot bind {}:{} ({}), falling back to an ephemeral port",
                    ip, self.client_port, e
                );
                Ok(bind_socket(ip, 0)?)
            }
        }
    }

    /// Run one INFORM exchange on `adapter`.
    pub async fn inform(&self, adapter: &NetAdapter) -> Result<Option<String>> {
        let Some(ip) = adapter.ipv4 else {
            return Ok(None);
        };
        let socket = self.open_socket(ip).await?;

        let xid = new_transaction_id();
        let request = DhcpMessage::inform(xid, ip, adapter.mac);
        let server = adapter.dhcp_server.unwrap_or(Ipv4Addr::BROADCAST);
        socket
            .send_to(&request.to_bytes(), SocketAddrV4::new(server, self.server_port))
            .await?;
        debug!("sent DHCPINFORM xid={:#010x} on {} to {}", xid, adapter.name, server);

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_MESSAGE_LEN];
        loop {
            let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            let (len, from) = match received {
                Ok(result) => result?,
                Err(_) => {
                    debug!("no DHCP reply on {} within {:?}", adapter.name, self.timeout);
                    return Ok(None);
                }
            };

            let reply = match DhcpMessage::parse(&buf[..len]) {
                Ok(reply) if reply.answers(xid) => reply,
                Ok(_) => {
                    debug!("ignoring unrelated DHCP message from {}", from);
                    continue;
                }
                Err(e) => {
                    debug!("ignoring malformed DHCP message from {}: {}", from, e);
                    continue;
                }
            };

            let url = reply.wpad_url();
            if let Some(url) = &url {
                info!("DHCP server {} advertised WPAD URL {}", from, url);
            }
            return Ok(url);
        }
    }

    /// Try each adapter in turn, stopping at the first WPAD URL.
    pub async fn discover(&self, adapters: &[NetAdapter]) -> Option<String> {
        for adapter in adapters.iter().filter(|a| a.can_inform()) {
            match self.inform(adapter).await {
                Ok(Some(url)) => return Some(url),
                Ok(None) => {}
                Err(e) => debug!("DHCP discovery on {} failed: {}", adapter.name, e),
            }
        }
        None
    }
}
