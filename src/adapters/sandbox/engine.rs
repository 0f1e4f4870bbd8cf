use std::net::{IpAddr, ToSocketAddrs, UdpSocket};

use boa_engine::{js_string, Context, JsResult, JsString, JsValue, NativeFunction, Source};
use log::{debug, info};
use url::Url;

use crate::adapters::net_adapter::{local_addresses, NetdevAdapters};
use crate::domain::{ProxyError, Result};

const PAC_UTILS: &str = include_str!("../../pac_utils.js");

const LOOP_ITERATION_LIMIT: u64 = 1_000_000;
const RECURSION_LIMIT: usize = 256;

/// Evaluate `script` and return what `FindProxyForURL(url, host)` yields.
///
/// Every call gets a fresh context, so nothing leaks between scripts.
pub fn find_proxy_for_url(script: &str, url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| ProxyError::InvalidUri(format!("{} has no host", url)))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(LOOP_ITERATION_LIMIT);
    context.runtime_limits_mut().set_recursion_limit(RECURSION_LIMIT);

    register_natives(&mut context).map_err(|e| script_error("registering natives", e))?;
    context
        .eval(Source::from_bytes(PAC_UTILS))
        .map_err(|e| script_error("PAC utilities", e))?;
    context
        .eval(Source::from_bytes(script))
        .map_err(|e| script_error("PAC script", e))?;

    let global = context.global_object();
    let value = global
        .get(js_string!("FindProxyForURL"), &mut context)
        .map_err(|e| script_error("FindProxyForURL lookup", e))?;
    let function = value
        .as_callable()
        .ok_or_else(|| ProxyError::ScriptFailed("FindProxyForURL is not a function".into()))?;

    let args = [
        JsValue::from(JsString::from(url.as_str())),
        JsValue::from(JsString::from(host)),
    ];
    let result = function
        .call(&JsValue::undefined(), &args, &mut context)
        .map_err(|e| script_error("FindProxyForURL", e))?;

    let list = result
        .as_string()
        .ok_or_else(|| ProxyError::ScriptFailed("FindProxyForURL did not return a string".into()))?
        .to_std_string_escaped();
    debug!("FindProxyForURL({}, {}) = {}", url, host, list);
    Ok(list)
}

fn script_error(stage: &str, err: impl std::fmt::Display) -> ProxyError {
    ProxyError::ScriptFailed(format!("{}: {}", stage, err))
}

fn register_natives(context: &mut Context) -> JsResult<()> {
    context.register_global_callable(
        js_string!("dnsResolve"),
        1,
        NativeFunction::from_fn_ptr(dns_resolve),
    )?;
    context.register_global_callable(
        js_string!("dnsResolveEx"),
        1,
        NativeFunction::from_fn_ptr(dns_resolve_ex),
    )?;
    context.register_global_callable(
        js_string!("myIpAddress"),
        0,
        NativeFunction::from_fn_ptr(my_ip_address),
    )?;
    context.register_global_callable(
        js_string!("myIpAddressEx"),
        0,
        NativeFunction::from_fn_ptr(my_ip_address_ex),
    )?;
    context.register_global_callable(js_string!("alert"), 1, NativeFunction::from_fn_ptr(alert))?;
    Ok(())
}

fn string_arg(args: &[JsValue], index: usize) -> String {
    args.get(index)
        .and_then(JsValue::as_string)
        .map(JsString::to_std_string_escaped)
        .unwrap_or_default()
}

fn js_str(value: &str) -> JsValue {
    JsValue::from(JsString::from(value))
}

fn join(addresses: impl IntoIterator<Item = IpAddr>) -> String {
    addresses
        .into_iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// All addresses of `host`, in resolver order, without duplicates.
fn resolve_host(host: &str) -> Vec<IpAddr> {
    if host.is_empty() {
        return Vec::new();
    }
    let mut addresses: Vec<IpAddr> = Vec::new();
    if let Ok(resolved) = (host, 0).to_socket_addrs() {
        for addr in resolved {
            if !addresses.contains(&addr.ip()) {
                addresses.push(addr.ip());
            }
        }
    }
    addresses
}

fn dns_resolve(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    let address = resolve_host(&string_arg(args, 0))
        .into_iter()
        .find(IpAddr::is_ipv4)
        .map(|ip| ip.to_string())
        .unwrap_or_default();
    Ok(js_str(&address))
}

fn dns_resolve_ex(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(js_str(&join(resolve_host(&string_arg(args, 0)))))
}

// Connecting a UDP socket sends nothing but selects the outbound interface.
fn outbound_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:53").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

fn my_ip_address(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    let address = outbound_ipv4()
        .or_else(|| {
            local_addresses(&NetdevAdapters)
                .into_iter()
                .find(IpAddr::is_ipv4)
        })
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    Ok(js_str(&address))
}

fn my_ip_address_ex(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(js_str(&join(local_addresses(&NetdevAdapters))))
}

fn alert(_this: &JsValue, args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    info!("PAC alert: {}", string_arg(args, 0));
    Ok(JsValue::undefined())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str, url: &str) -> Result<String> {
        find_proxy_for_url(script, &Url::parse(url).unwrap())
    }

    fn eval_bool(expr: &str) -> bool {
        let script = format!(
            "function FindProxyForURL(url, host) {{ return ({}) ? \"yes\" : \"no\"; }}",
            expr
        );
        run(&script, "http://www.example.com/").unwrap() == "yes"
    }

    #[test]
    fn test_returns_script_result() {
        let script = r#"
            function FindProxyForURL(url, host) {
                if (isPlainHostName(host)) return "DIRECT";
                if (shExpMatch(url, "*.example.com/*")) return "PROXY proxy.example.com:8080; DIRECT";
                return "DIRECT";
            }
        "#;
        assert_eq!(
            run(script, "http://www.example.com/index.html").unwrap(),
            "PROXY proxy.example.com:8080; DIRECT"
        );
        assert_eq!(run(script, "http://intranet/").unwrap(), "DIRECT");
    }

    #[test]
    fn test_host_argument_has_no_brackets() {
        let script = "function FindProxyForURL(url, host) { return host; }";
        assert_eq!(run(script, "http://[::1]:8080/").unwrap(), "::1");
        assert_eq!(run(script, "https://Example.COM/a").unwrap(), "example.com");
    }

    #[test]
    fn test_syntax_error_is_script_failure() {
        let err = run("function FindProxyForURL(url, host) {", "http://a.b/").unwrap_err();
        assert!(matches!(err, ProxyError::ScriptFailed(_)));
    }

    #[test]
    fn test_missing_entry_point_is_script_failure() {
        let err = run("var x = 1;", "http://a.b/").unwrap_err();
        assert!(matches!(err, ProxyError::ScriptFailed(_)));
    }

    #[test]
    fn test_non_string_result_is_script_failure() {
        let err = run("function FindProxyForURL(url, host) { return 42; }", "http://a.b/").unwrap_err();
        assert!(matches!(err, ProxyError::ScriptFailed(_)));
    }

    #[test]
    fn test_thrown_exception_is_script_failure() {
        let err = run(
            "function FindProxyForURL(url, host) { throw new Error('nope'); }",
            "http://a.b/",
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::ScriptFailed(_)));
    }

    #[test]
    fn test_runaway_loop_is_stopped() {
        let err = run(
            "function FindProxyForURL(url, host) { while (true) {} }",
            "http://a.b/",
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::ScriptFailed(_)));
    }

    #[test]
    fn test_host_helpers() {
        assert!(eval_bool("isPlainHostName('intranet')"));
        assert!(!eval_bool("isPlainHostName('www.example.com')"));
        assert!(eval_bool("dnsDomainIs('www.example.com', '.example.com')"));
        assert!(!eval_bool("dnsDomainIs('www', '.example.com')"));
        assert!(eval_bool("localHostOrDomainIs('www', 'www.example.com')"));
        assert!(eval_bool("localHostOrDomainIs('www.example.com', 'www.example.com')"));
        assert!(!eval_bool("localHostOrDomainIs('home.example.com', 'www.example.com')"));
        assert!(eval_bool("dnsDomainLevels('www.example.com') == 2"));
        assert!(eval_bool("dnsDomainLevels('www') == 0"));
    }

    #[test]
    fn test_pattern_and_network_helpers() {
        assert!(eval_bool("shExpMatch('http://home.example.com/x', '*/x')"));
        assert!(eval_bool("shExpMatch('a.b', 'a?b')"));
        assert!(!eval_bool("shExpMatch('axb', 'a.b')"));
        assert!(eval_bool("isInNet('198.95.249.79', '198.95.249.0', '255.255.255.0')"));
        assert!(!eval_bool("isInNet('198.95.250.79', '198.95.249.0', '255.255.255.0')"));
        assert!(eval_bool("isInNetEx('10.1.2.3', '10.0.0.0/8')"));
        assert!(!eval_bool("isInNetEx('11.1.2.3', '10.0.0.0/8')"));
        assert!(eval_bool("isInNetEx('2001:db8::1', '2001:db8::/32')"));
        assert!(!eval_bool("isInNetEx('2001:db9::1', '2001:db8::/32')"));
        assert!(eval_bool("sortIpAddressList('10.2.0.1;10.1.0.1;::1') == '::1;10.1.0.1;10.2.0.1'"));
    }

    #[test]
    fn test_resolution_helpers_on_literals() {
        assert!(eval_bool("dnsResolve('127.0.0.1') == '127.0.0.1'"));
        assert!(eval_bool("dnsResolveEx('::1') == '::1'"));
        assert!(eval_bool("isResolvable('127.0.0.1')"));
        assert!(eval_bool("myIpAddress().length > 0"));
        assert!(eval_bool("typeof myIpAddressEx() == 'string'"));
    }

    #[test]
    fn test_time_helpers_cover_full_ranges() {
        assert!(eval_bool("weekdayRange('SUN', 'SAT')"));
        assert!(eval_bool("timeRange(0, 23)"));
        assert!(eval_bool("dateRange('JAN', 'DEC')"));
        assert!(eval_bool("dateRange(1, 31, 'GMT')"));
        assert!(!eval_bool("dateRange(1970, 1971)"));
        assert!(!eval_bool("weekdayRange('XYZ')"));
    }

    #[test]
    fn test_resolve_host_literal() {
        assert_eq!(resolve_host("127.0.0.1"), vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
        assert!(resolve_host("").is_empty());
    }
}
