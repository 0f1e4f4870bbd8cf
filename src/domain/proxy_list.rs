//! Proxy-list grammars.
//!
//! The PAC return grammar is `DIRECT`, `PROXY host:port`, or one of
//! `HTTP`/`HTTPS`/`SOCKS`/`SOCKS4`/`SOCKS5` followed by `host:port`, with
//! entries separated by `;`. The output representation is a comma-joined list
//! of `scheme://host[:port]` candidates in the original order.

use super::models::DIRECT;

/// Scheme for a bare `PROXY host:port` entry, inferred from the port.
pub fn scheme_for_port(port: Option<u16>) -> &'static str {
    match port {
        Some(80) => "http",
        Some(443) => "https",
        Some(1080) => "socks",
        Some(21) => "ftp",
        _ => "http",
    }
}

/// Port of a `host[:port]` string, accepting bracketed IPv6 literals.
pub fn host_port(host: &str) -> Option<u16> {
    let after_host = match host.strip_prefix('[') {
        Some(rest) => &rest[rest.find(']')? + 1..],
        None => {
            // A bare IPv6 literal has several colons and no port.
            if host.matches(':').count() > 1 {
                return None;
            }
            host
        }
    };
    after_host.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
}

fn scheme_for_token(token: &str) -> Option<&'static str> {
    let scheme = match token.to_ascii_uppercase().as_str() {
        "DIRECT" => "direct",
        "PROXY" => "",
        "HTTP" => "http",
        "HTTPS" => "https",
        "SOCKS" => "socks",
        "SOCKS4" => "socks4",
        "SOCKS5" => "socks5",
        _ => return None,
    };
    Some(scheme)
}

/// Convert a PAC return value into a comma-joined candidate list.
///
/// A bare `PROXY` token (or an entry without any token) takes `default_scheme`
/// when given, otherwise a scheme inferred from the port.
pub fn convert_proxy_list_to_uri_list(text: &str, default_scheme: Option<&str>) -> String {
    let mut uris = Vec::new();

    for entry in text.split(';') {
        let entry = entry.trim_start_matches(' ').trim_end();
        if entry.is_empty() {
            continue;
        }

        let (token, rest) = match entry.split_once(' ') {
            Some((token, rest)) => (token, rest),
            None => (entry, ""),
        };

        let (scheme, host) = match scheme_for_token(token) {
            Some("direct") => {
                uris.push(DIRECT.to_string());
                continue;
            }
            Some("") => (None, rest.trim()),
            Some(scheme) => (Some(scheme), rest.trim()),
            None => (None, entry),
        };

        let scheme = scheme
            .or(default_scheme)
            .unwrap_or_else(|| scheme_for_port(host_port(host)));
        uris.push(format!("{}://{}", scheme, host));
    }

    uris.join(",")
}

/// Convert a platform-native proxy list into a comma-joined candidate list.
///
/// Entries are separated by `;` or whitespace and may name their scheme as
/// `scheme=host:port` or `scheme://host:port`; entries without one use `http`.
pub fn convert_native_proxy_list(text: &str) -> String {
    text.split(|c: char| c == ';' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if let Some((scheme, host)) = entry.split_once('=') {
                format!("{}://{}", scheme.to_ascii_lowercase(), host)
            } else if let Some((scheme, host)) = entry.split_once("://") {
                format!("{}://{}", scheme.to_ascii_lowercase(), host)
            } else {
                format!("http://{}", entry)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a candidate list into its entries.
pub fn candidates(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_list_keeps_order() {
        assert_eq!(
            convert_proxy_list_to_uri_list("HTTP a:80;SOCKS b:1080;DIRECT", None),
            "http://a:80,socks://b:1080,direct://"
        );
    }

    #[test]
    fn test_proxy_with_spaces_after_separator() {
        assert_eq!(
            convert_proxy_list_to_uri_list("PROXY p.example.com:8080; DIRECT", None),
            "http://p.example.com:8080,direct://"
        );
    }

    #[test]
    fn test_bare_proxy_infers_scheme_from_port() {
        assert_eq!(convert_proxy_list_to_uri_list("PROXY h:443", None), "https://h:443");
        assert_eq!(convert_proxy_list_to_uri_list("PROXY h:1080", None), "socks://h:1080");
        assert_eq!(convert_proxy_list_to_uri_list("PROXY h:21", None), "ftp://h:21");
        assert_eq!(convert_proxy_list_to_uri_list("PROXY h:3128", None), "http://h:3128");
        assert_eq!(convert_proxy_list_to_uri_list("PROXY h", None), "http://h");
    }

    #[test]
    fn test_implicit_proxy_token() {
        assert_eq!(
            convert_proxy_list_to_uri_list("10.0.0.1:443;proxy.local:80", None),
            "https://10.0.0.1:443,http://proxy.local:80"
        );
    }

    #[test]
    fn test_explicit_tokens_override_port_inference() {
        assert_eq!(
            convert_proxy_list_to_uri_list("HTTPS s:8443;SOCKS5 s5:9050;SOCKS4 s4:1080", None),
            "https://s:8443,socks5://s5:9050,socks4://s4:1080"
        );
    }

    #[test]
    fn test_default_scheme_applies_to_bare_proxy_only() {
        assert_eq!(
            convert_proxy_list_to_uri_list("PROXY a:443;SOCKS b:1080", Some("http")),
            "http://a:443,socks://b:1080"
        );
    }

    #[test]
    fn test_element_count_matches_input() {
        let input = "PROXY a:1;PROXY b:2; PROXY c:3;DIRECT;SOCKS5 d:4";
        let output = convert_proxy_list_to_uri_list(input, None);
        assert_eq!(output.split(',').count(), input.split(';').count());
    }

    #[test]
    fn test_ipv6_proxy_port() {
        assert_eq!(host_port("[::1]:1080"), Some(1080));
        assert_eq!(host_port("::1"), None);
        assert_eq!(convert_proxy_list_to_uri_list("PROXY [::1]:443", None), "https://[::1]:443");
    }

    #[test]
    fn test_native_list() {
        assert_eq!(
            convert_native_proxy_list("http=a:80;https=b:443 socks://c:1080  d:3128"),
            "http://a:80,https://b:443,socks://c:1080,http://d:3128"
        );
        assert_eq!(convert_native_proxy_list("http://127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(convert_native_proxy_list(""), "");
    }

    #[test]
    fn test_candidates_split() {
        assert_eq!(candidates("http://a:1, direct://"), vec!["http://a:1", "direct://"]);
        assert!(candidates("").is_empty());
    }
}
