#![cfg(test)]
#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::ACCEPT;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as ServerBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use autoproxy::adapters::reqwest_client::PAC_MIME_TYPE;

pub const PAC_PATH: &str = "/proxy.pac";

/// PAC script sending `*.example.com` through `proxy_host:proxy_port`, with a direct fallback.
pub fn create_pac_script(proxy_host: &str, proxy_port: u16) -> String {
    format!(
        r#"
function FindProxyForURL(url, host) {{
    if (dnsDomainIs(host, ".example.com")) {{
        return "PROXY {proxy_host}:{proxy_port}; DIRECT";
    }}
    if (isPlainHostName(host)) {{
        return "SOCKS5 {proxy_host}:1080";
    }}
    return "DIRECT";
}}
"#,
        proxy_host = proxy_host,
        proxy_port = proxy_port
    )
}

#[derive(Default)]
struct Stats {
    hits: AtomicUsize,
    bad_accept: AtomicBool,
}

/// Serves one PAC script at [`PAC_PATH`] and 404 everywhere else.
pub struct TestPacServer {
    addr: SocketAddr,
    stats: Arc<Stats>,
    _server_handle: JoinHandle<()>,
}

async fn serve(
    req: Request<Incoming>,
    script: Arc<String>,
    stats: Arc<Stats>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != PAC_PATH {
        let mut response = Response::new(Full::new(Bytes::from_static(b"not found")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return Ok(response);
    }

    stats.hits.fetch_add(1, Ordering::SeqCst);
    let accept = req.headers().get(ACCEPT).and_then(|v| v.to_str().ok());
    if accept != Some(PAC_MIME_TYPE) {
        stats.bad_accept.store(true, Ordering::SeqCst);
    }

    let mut response = Response::new(Full::new(Bytes::from(script.as_bytes().to_vec())));
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, PAC_MIME_TYPE.parse().unwrap());
    Ok(response)
}

impl TestPacServer {
    pub async fn start(script: String) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let script = Arc::new(script);
        let stats = Arc::new(Stats::default());

        let server_stats = stats.clone();
        let server_handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let io = TokioIo::new(stream);
                        let script = script.clone();
                        let stats = server_stats.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| serve(req, script.clone(), stats.clone()));
                            if let Err(_err) = ServerBuilder::new(hyper_util::rt::TokioExecutor::new())
                                .serve_connection(io, service)
                                .await
                            {
                                // Clients may hang up early
                            }
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            addr,
            stats,
            _server_handle: server_handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn pac_url(&self) -> String {
        self.url(PAC_PATH)
    }

    /// Number of requests for the PAC script.
    pub fn hits(&self) -> usize {
        self.stats.hits.load(Ordering::SeqCst)
    }

    /// Whether every PAC request carried the PAC media type in `Accept`.
    pub fn accept_header_ok(&self) -> bool {
        !self.stats.bad_accept.load(Ordering::SeqCst)
    }
}
