//! SSRF guard applied to every URL the broker fetches on a user's behalf
//! (AI Router endpoints, future webhook configs).
//!
//! Checks the URL's scheme and host synchronously, then resolves the
//! host and checks every returned address too — a hostname that only
//! resolves to a blocked range must be rejected even if the name itself
//! looks innocuous.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use agentim_domain::error::{Error, Result};
use agentim_domain::trace::TraceEvent;
use tokio::net::lookup_host;

const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Validate `url` against the SSRF blocklist, including a DNS resolution
/// pass. Returns the validated socket addresses a caller may connect to.
pub async fn guard_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::Validation(format!("invalid URL: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return reject(url, "non-http(s) scheme");
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Validation("URL has no host".into()))?;

    if is_blocked_hostname(host) {
        return reject(url, "blocked hostname");
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_blocked_ip(&ip) {
            return reject(url, "blocked literal IP");
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(443);
    let lookup_target = format!("{host}:{port}");
    let resolved = tokio::time::timeout(DNS_TIMEOUT, lookup_host(lookup_target)).await;

    let addrs = match resolved {
        Ok(Ok(iter)) => iter.map(|sa| sa.ip()).collect::<Vec<_>>(),
        Ok(Err(e)) => return reject(url, &format!("DNS error: {e}")),
        Err(_) => return reject(url, "DNS timeout"),
    };

    if addrs.is_empty() {
        return reject(url, "DNS resolved to no addresses");
    }

    if addrs.iter().any(is_blocked_ip) {
        return reject(url, "resolved address in blocked range");
    }

    Ok(())
}

fn reject(host: &str, reason: &str) -> Result<()> {
    TraceEvent::SsrfBlocked {
        host: host.to_string(),
        reason: reason.to_string(),
    }
    .emit();
    Err(Error::Validation(format!("SSRF guard rejected {host}: {reason}")))
}

fn is_blocked_hostname(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    lower == "localhost"
        || lower.ends_with(".localhost")
        || lower.ends_with(".local")
        || lower.ends_with(".internal")
        || looks_like_numeric_encoded_ip(&lower)
}

/// Catch alternate IP encodings browsers/curl accept but a naive
/// `Ipv4Addr::parse` would reject outright, e.g. octal `0177.0.0.1` or a
/// bare decimal `2130706433` (== 127.0.0.1).
fn looks_like_numeric_encoded_ip(host: &str) -> bool {
    if host.chars().all(|c| c.is_ascii_digit()) && !host.is_empty() {
        return true;
    }
    host.split('.').all(|part| {
        !part.is_empty()
            && (part.starts_with("0x")
                || part.starts_with("0X")
                || (part.starts_with('0') && part.len() > 1 && part.chars().all(|c| c.is_ascii_digit())))
    })
}

fn is_blocked_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_blocked_v4(ip: &Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
    {
        return true;
    }
    // CGNAT: 100.64.0.0/10
    let octets = ip.octets();
    if octets[0] == 100 && (64..=127).contains(&octets[1]) {
        return true;
    }
    // Cloud metadata endpoint.
    if *ip == Ipv4Addr::new(169, 254, 169, 254) {
        return true;
    }
    false
}

fn is_blocked_v6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return true;
    }
    // fc00::/7 unique local.
    if (ip.segments()[0] & 0xfe00) == 0xfc00 {
        return true;
    }
    // fe80::/10 link-local.
    if (ip.segments()[0] & 0xffc0) == 0xfe80 {
        return true;
    }
    // IPv4-mapped IPv6 (::ffff:a.b.c.d) must be checked against the v4 rules.
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_v4(&v4);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_loopback_v4() {
        assert!(is_blocked_v4(&Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn blocks_rfc1918() {
        assert!(is_blocked_v4(&Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_blocked_v4(&Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_blocked_v4(&Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn blocks_cgnat() {
        assert!(is_blocked_v4(&Ipv4Addr::new(100, 64, 0, 5)));
        assert!(!is_blocked_v4(&Ipv4Addr::new(100, 63, 0, 5)));
    }

    #[test]
    fn blocks_cloud_metadata() {
        assert!(is_blocked_v4(&Ipv4Addr::new(169, 254, 169, 254)));
    }

    #[test]
    fn blocks_ipv4_mapped_ipv6() {
        let mapped: Ipv6Addr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(is_blocked_v6(&mapped));
    }

    #[test]
    fn blocks_unique_local_v6() {
        let ula: Ipv6Addr = "fd00::1".parse().unwrap();
        assert!(is_blocked_v6(&ula));
    }

    #[test]
    fn allows_public_v4() {
        assert!(!is_blocked_v4(&Ipv4Addr::new(93, 184, 216, 34)));
    }

    #[test]
    fn blocks_internal_tld_hostnames() {
        assert!(is_blocked_hostname("foo.internal"));
        assert!(is_blocked_hostname("bar.local"));
        assert!(is_blocked_hostname("localhost"));
    }

    #[test]
    fn blocks_numeric_encoded_ip_hostnames() {
        assert!(is_blocked_hostname("2130706433"));
        assert!(is_blocked_hostname("0177.0.0.1"));
    }

    #[test]
    fn allows_ordinary_hostnames() {
        assert!(!is_blocked_hostname("api.example.com"));
    }
}
