#![cfg(test)]
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use autoproxy::adapters::wpad::dhcp::{
    DhcpMessage, DhcpOption, BOOTREPLY, DHCPINFORM, OPTION_MESSAGE_TYPE, OPTION_WPAD,
};

const DHCPACK: u8 = 5;

/// Answers every DHCPINFORM on a loopback port with a fixed WPAD URL.
pub struct FakeDhcpServer {
    addr: SocketAddr,
    informs: Arc<AtomicUsize>,
    _server_handle: JoinHandle<()>,
}

impl FakeDhcpServer {
    pub async fn start(wpad_url: String) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let informs = Arc::new(AtomicUsize::new(0));

        let counter = informs.clone();
        let server_handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(_) => break,
                };
                let Ok(request) = DhcpMessage::parse(&buf[..len]) else {
                    continue;
                };
                if request.option(OPTION_MESSAGE_TYPE) != Some(&[DHCPINFORM][..]) {
                    continue;
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let mut reply = request.clone();
                reply.op = BOOTREPLY;
                reply.options = vec![
                    DhcpOption {
                        code: OPTION_MESSAGE_TYPE,
                        data: vec![DHCPACK],
                    },
                    DhcpOption {
                        code: OPTION_WPAD,
                        data: wpad_url.as_bytes().to_vec(),
                    },
                ];
                let _ = socket.send_to(&reply.to_bytes(), from).await;
            }
        });

        Ok(Self {
            addr,
            informs,
            _server_handle: server_handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn informs(&self) -> usize {
        self.informs.load(Ordering::SeqCst)
    }
}
