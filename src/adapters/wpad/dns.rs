use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, info};

use crate::ports::{Discovered, FetchPort};

/// Local fully-qualified domain name.
///
/// Falls back to the first search domain of `/etc/resolv.conf` when the
/// hostname has no domain part.
pub fn local_fqdn() -> Option<String> {
    let host = hostname::get().ok()?.into_string().ok()?;
    if host.contains('.') {
        return Some(host);
    }
    let domain = resolv_conf_domain()?;
    Some(format!("{}.{}", host, domain))
}

fn resolv_conf_domain() -> Option<String> {
    let buf = std::fs::read("/etc/resolv.conf").ok()?;
    let cfg = resolv_conf::Config::parse(&buf).ok()?;
    cfg.get_domain()
        .cloned()
        .or_else(|| cfg.get_search().and_then(|search| search.first().cloned()))
        .map(|domain| domain.trim_end_matches('.').to_string())
        .filter(|domain| !domain.is_empty())
}

fn is_numeric_host(name: &str) -> bool {
    name.parse::<IpAddr>().is_ok() || name.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Candidate `wpad.dat` URLs for `fqdn`, most specific first.
///
/// Each step strips the leftmost label. Single-label suffixes such as `com`
/// are never probed.
pub fn wpad_candidates(fqdn: &str) -> Vec<String> {
    let fqdn = fqdn.trim_end_matches('.');
    if fqdn.is_empty() || fqdn.eq_ignore_ascii_case("localhost") || is_numeric_host(fqdn) {
        return Vec::new();
    }

    let mut urls = Vec::new();
    let mut rest = fqdn;
    while let Some((_, suffix)) = rest.split_once('.') {
        if !suffix.contains('.') {
            break;
        }
        urls.push(format!("http://wpad.{}/wpad.dat", suffix));
        rest = suffix;
    }
    urls
}

/// Probes `http://wpad.<suffix>/wpad.dat` for each DNS suffix of the host.
pub struct DnsDiscovery {
    fetcher: Arc<dyn FetchPort>,
}

impl DnsDiscovery {
    pub fn new(fetcher: Arc<dyn FetchPort>) -> Self {
        Self { fetcher }
    }

    pub async fn discover(&self, fqdn: &str) -> Option<Discovered> {
        for url in wpad_candidates(fqdn) {
            debug!("probing {}", url);
            match self.fetcher.get(&url).await {
                Ok(script) => {
                    info!("found WPAD script at {} ({} bytes)", url, script.len());
                    return Some(Discovered::Script { url, script });
                }
                Err(e) => debug!("no WPAD script at {}: {}", url, e),
            }
        }
        None
    }
}
