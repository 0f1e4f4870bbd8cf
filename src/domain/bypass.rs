//! Bypass-list evaluation.
//!
//! Rules are comma separated and evaluated in order; the final value wins.
//! Loopback hosts start out bypassed, `<-loopback>` clears that, and every
//! other rule can only set the decision.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

const LOCAL_RULE: &str = "<local>";
const NO_LOOPBACK_RULE: &str = "<-loopback>";

/// Case-insensitive glob match where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p].eq_ignore_ascii_case(&text[t]) {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

fn split_cidr(cidr: &str) -> Option<(&str, u32)> {
    let (addr, prefix) = cidr.trim().split_once('/')?;
    Some((addr.trim_start_matches('[').trim_end_matches(']'), prefix.trim().parse().ok()?))
}

fn prefix_matches(ip: &[u8], net: &[u8], prefix: u32) -> bool {
    let full_bytes = (prefix / 8) as usize;
    let remaining_bits = prefix % 8;

    if ip[..full_bytes] != net[..full_bytes] {
        return false;
    }
    if remaining_bits == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - remaining_bits);
    ip[full_bytes] & mask == net[full_bytes] & mask
}

/// Whether `ip` lies in the IPv4 range `cidr` (`a.b.c.d/len`).
pub fn is_ipv4_in_cidr_range(ip: &str, cidr: &str) -> bool {
    let Ok(ip) = ip.parse::<Ipv4Addr>() else {
        return false;
    };
    let Some((net, prefix)) = split_cidr(cidr) else {
        return false;
    };
    let Ok(net) = net.parse::<Ipv4Addr>() else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    prefix_matches(&ip.octets(), &net.octets(), prefix)
}

/// Whether `ip` lies in the IPv6 range `cidr` (`addr/len`).
pub fn is_ipv6_in_cidr_range(ip: &str, cidr: &str) -> bool {
    let Ok(ip) = ip.trim_start_matches('[').trim_end_matches(']').parse::<Ipv6Addr>() else {
        return false;
    };
    let Some((net, prefix)) = split_cidr(cidr) else {
        return false;
    };
    let Ok(net) = net.parse::<Ipv6Addr>() else {
        return false;
    };
    if prefix > 128 {
        return false;
    }
    prefix_matches(&ip.octets(), &net.octets(), prefix)
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Split a rule into host pattern and optional port, handling `[v6]:port`.
fn split_rule(rule: &str) -> (&str, Option<u16>) {
    if let Some(rest) = rule.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let port = rest[end + 1..].strip_prefix(':').and_then(|p| p.parse().ok());
            return (&rest[..end], port);
        }
    }
    if rule.matches(':').count() == 1 {
        if let Some((host, port)) = rule.split_once(':') {
            if let Ok(port) = port.parse() {
                return (host, Some(port));
            }
        }
    }
    (rule, None)
}

fn rule_matches(rule: &str, host: &str, port: u16) -> bool {
    let rule = rule.split_once("://").map(|(_, r)| r).unwrap_or(rule);
    let (pattern, rule_port) = split_rule(rule);

    if rule_port.is_some_and(|p| p != port) {
        return false;
    }
    if pattern.starts_with('.') {
        return wildcard_match(&format!("*{}", pattern), host);
    }
    wildcard_match(pattern, host)
}

fn cidr_matches(rule: &str, host: &str) -> bool {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => is_ipv4_in_cidr_range(host, rule),
        Ok(IpAddr::V6(_)) => is_ipv6_in_cidr_range(host, rule),
        Err(_) => false,
    }
}

/// Decide whether `url` should skip the proxy according to `bypass_list`.
pub fn should_bypass_proxy(url: &Url, bypass_list: Option<&str>) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = url
        .port()
        .unwrap_or_else(|| if url.scheme() == "https" { 443 } else { 80 });

    let mut bypass = is_loopback(host);

    for rule in bypass_list.unwrap_or_default().split(',').map(str::trim) {
        if rule.is_empty() {
            continue;
        }
        if rule.eq_ignore_ascii_case(NO_LOOPBACK_RULE) {
            if is_loopback(host) {
                bypass = false;
            }
        } else if rule.eq_ignore_ascii_case(LOCAL_RULE) {
            if !host.contains('.') {
                bypass = true;
            }
        } else if rule.contains('/') && !rule.contains("://") {
            if cidr_matches(rule, host) {
                bypass = true;
            }
        } else if rule_matches(rule, host, port) {
            bypass = true;
        }
    }

    bypass
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bypass(url: &str, list: &str) -> bool {
        should_bypass_proxy(&url.parse().unwrap(), Some(list))
    }

    #[test]
    fn test_localhost_bypassed_by_default() {
        assert!(bypass("http://localhost/", ""));
        assert!(bypass("http://localhost/", "example.com,<local>"));
        assert!(bypass("http://127.0.0.1:8080/", "*.corp"));
        assert!(bypass("http://[::1]/", "foo"));
        assert!(!should_bypass_proxy(&"http://example.com/".parse().unwrap(), None));
    }

    #[test]
    fn test_no_loopback_rule_reenables_proxy() {
        assert!(!bypass("http://localhost/", "<-loopback>"));
        assert!(!bypass("http://127.0.0.1/", "<-loopback>"));
        assert!(bypass("http://localhost/", "<-loopback>,localhost"));
    }

    #[test]
    fn test_leading_dot_matches_subdomains_only() {
        assert!(bypass("http://my.example.com/", ".example.com"));
        assert!(!bypass("http://example.com/", ".example.com"));
    }

    #[test]
    fn test_wildcard_rules_are_case_insensitive() {
        assert!(bypass("http://WWW.Example.COM/path", "*.example.com"));
        assert!(bypass("http://intranet/", "intra*"));
        assert!(!bypass("http://internet.com/", "intra*"));
    }

    #[test]
    fn test_rule_port_must_match_url_port() {
        assert!(bypass("http://example.com/", "example.com:80"));
        assert!(!bypass("http://example.com/", "example.com:8080"));
        assert!(bypass("https://example.com/", "example.com:443"));
        assert!(bypass("http://example.com:8080/", "example.com:8080"));
        assert!(bypass("http://example.com:8080/", "example.com"));
    }

    #[test]
    fn test_local_rule_matches_simple_hostnames() {
        assert!(bypass("http://printer/", "<local>"));
        assert!(!bypass("http://printer.lan/", "<local>"));
    }

    #[test]
    fn test_cidr_rules() {
        assert!(bypass("http://10.1.2.3/", "10.0.0.0/8"));
        assert!(!bypass("http://11.1.2.3/", "10.0.0.0/8"));
        assert!(bypass("http://[fd00::1]/", "fd00::/8"));
        assert!(!bypass("http://example.com/", "0.0.0.0/0"));
    }

    #[test]
    fn test_userinfo_is_not_part_of_host() {
        assert!(bypass("http://user:pw@internal.corp/x", "*.corp"));
        assert!(!bypass("http://internal.corp@evil.com/", "*.corp"));
    }

    #[test]
    fn test_ipv4_cidr_reflexive_and_zero_prefix() {
        for ip in ["1.2.3.4", "192.168.0.1", "255.255.255.255", "0.0.0.0"] {
            assert!(is_ipv4_in_cidr_range(ip, &format!("{}/32", ip)));
            assert!(is_ipv4_in_cidr_range(ip, "203.0.113.9/0"));
        }
        assert!(!is_ipv4_in_cidr_range("1.2.3.4", "1.2.3.4/33"));
        assert!(!is_ipv4_in_cidr_range("not-an-ip", "1.2.3.4/32"));
        assert!(is_ipv4_in_cidr_range("192.168.1.77", "192.168.1.64/26"));
        assert!(!is_ipv4_in_cidr_range("192.168.1.128", "192.168.1.64/26"));
    }

    #[test]
    fn test_ipv6_cidr() {
        assert!(is_ipv6_in_cidr_range("2001:db8::1", "2001:db8::/32"));
        assert!(!is_ipv6_in_cidr_range("2001:db9::1", "2001:db8::/32"));
        assert!(is_ipv6_in_cidr_range("::1", "::1/128"));
        assert!(is_ipv6_in_cidr_range("fe80::1", "::/0"));
    }

    #[test]
    fn test_cidr_agrees_with_ipnet() {
        let nets = ["10.0.0.0/8", "172.16.0.0/12", "192.168.1.64/27", "0.0.0.0/0", "100.64.0.1/31"];
        let ips = ["10.255.1.1", "172.31.255.255", "172.32.0.1", "192.168.1.95", "192.168.1.96", "100.64.0.0"];
        for net in nets {
            let parsed: ipnet::Ipv4Net = net.parse().unwrap();
            for ip in ips {
                let addr: Ipv4Addr = ip.parse().unwrap();
                assert_eq!(
                    is_ipv4_in_cidr_range(ip, net),
                    parsed.contains(&addr),
                    "{} in {}",
                    ip,
                    net
                );
            }
        }
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(wildcard_match("*.b.*", "a.b.c"));
        assert!(!wildcard_match("a*c", "abcd"));
        assert!(wildcard_match("ABC", "abc"));
    }
}
