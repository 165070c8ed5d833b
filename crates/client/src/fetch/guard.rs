//! URL normalization and private-address gating for page fetches.

use std::net::IpAddr;

use isis_core::Error;
use url::{Host, Url};

/// Normalize a user-supplied URL.
///
/// Trims whitespace, defaults the scheme to `https`, lowercases the host and
/// drops the fragment. Only http(s) survives.
pub fn canonicalize(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty URL".into()));
    }

    let candidate = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let mut url = Url::parse(&candidate).map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!("unsupported scheme: {}", url.scheme())));
    }
    if url.host().is_none() {
        return Err(Error::InvalidUrl(format!("{trimmed}: missing host")));
    }

    url.set_fragment(None);
    Ok(url)
}

/// Loopback, private, link-local, CGNAT, multicast and unspecified ranges.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || a == 0
                || (a == 100 && (64..128).contains(&b))
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || first & 0xfe00 == 0xfc00
                || first & 0xffc0 == 0xfe80
        }
    }
}

/// Refuse URLs whose host is, or resolves to, a non-public address.
///
/// Resolution failures are left for the HTTP request to report.
pub async fn ensure_public(url: &Url) -> Result<(), Error> {
    let host = match url.host() {
        Some(Host::Ipv4(ip)) => return check_ip(url, IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => return check_ip(url, IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => domain.to_string(),
        None => return Err(Error::InvalidUrl(format!("{url}: missing host"))),
    };

    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
        return Err(Error::SsrfBlocked(format!("{host} is a local host")));
    }

    let port = url.port_or_known_default().unwrap_or(443);
    match tokio::net::lookup_host((host.as_str(), port)).await {
        Ok(addrs) => {
            for addr in addrs {
                check_ip(url, addr.ip())?;
            }
            Ok(())
        }
        Err(e) => {
            tracing::debug!(%host, error = %e, "dns lookup failed before fetch");
            Ok(())
        }
    }
}

fn check_ip(url: &Url, ip: IpAddr) -> Result<(), Error> {
    if is_private_or_reserved(ip) {
        return Err(Error::SsrfBlocked(format!("{} resolves to non-public address {}", url, ip)));
    }
    Ok(())
}
