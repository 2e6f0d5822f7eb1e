//! SSRF containment for origin URLs.
//!
//! An origin URL is fetch-safe only when its scheme is plain HTTP(S) and its
//! hostname does not resolve into loopback, private, link-local, or reserved
//! address space. Resolution failures are accepted: the guard exists to stop
//! lookup-into-private-range attacks, not to prove liveness — an unresolvable
//! host simply fails in the HTTP client a moment later.

use std::net::IpAddr;

use tokio::net::lookup_host;
use url::Url;

/// Classify a resolved address. Returns the rejection reason, or `None` when
/// the address is publicly routable.
pub fn ip_block_reason(ip: IpAddr) -> Option<String> {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            if v4.is_loopback() {
                Some(format!("loopback address {v4}"))
            } else if v4.is_private() {
                Some(format!("private IP address {v4}"))
            } else if v4.is_link_local() {
                Some(format!("link-local address {v4}"))
            } else if v4.is_broadcast() || v4.is_documentation() {
                Some(format!("reserved IP address {v4}"))
            } else if octets[0] >= 240 || octets[0] == 0 {
                // 240.0.0.0/4 and 0.0.0.0/8; the std predicates for these are
                // not stable yet.
                Some(format!("reserved IP address {v4}"))
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            if v6.is_loopback() || v6.is_unspecified() {
                Some(format!("loopback address {v6}"))
            } else if seg[0] & 0xfe00 == 0xfc00 {
                // fc00::/7 unique-local
                Some(format!("private IP address {v6}"))
            } else if seg[0] & 0xffc0 == 0xfe80 {
                // fe80::/10 link-local
                Some(format!("link-local address {v6}"))
            } else if let Some(mapped) = v6.to_ipv4_mapped() {
                ip_block_reason(IpAddr::V4(mapped))
            } else {
                None
            }
        }
    }
}

/// Decide whether an origin URL is safe to fetch. Returns `(safe, reason)`;
/// the reason is surfaced verbatim in the 403 body.
pub async fn is_safe_origin_url(url: &str) -> (bool, String) {
    let parsed = match Url::parse(url) {
        Ok(p) => p,
        Err(e) => return (false, format!("Validation error: {e}")),
    };

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return (
            false,
            format!("Invalid scheme: {scheme}. Only HTTP/HTTPS allowed"),
        );
    }

    let hostname = match parsed.host_str() {
        Some(h) => h.trim_matches(|c| c == '[' || c == ']').to_string(),
        None => return (false, "Missing hostname".to_string()),
    };

    if matches!(
        hostname.to_ascii_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "::1"
    ) {
        return (false, "Blocked: localhost access not allowed".to_string());
    }

    // Literal IP: classify directly, no lookup round trip.
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        if let Some(reason) = ip_block_reason(ip) {
            return (false, format!("Blocked: {reason}"));
        }
        return (true, "OK".to_string());
    }

    match lookup_host((hostname.as_str(), 80)).await {
        Ok(addrs) => {
            for addr in addrs {
                if let Some(reason) = ip_block_reason(addr.ip()) {
                    return (false, format!("Blocked: {reason}"));
                }
            }
        }
        Err(_) => {
            // Unresolvable: let the upstream client surface the error.
        }
    }

    (true, "OK".to_string())
}
