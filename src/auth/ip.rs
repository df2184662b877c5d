//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Extract the client IP address.
///
/// With `trust_forwarded_for`, the first entry of `X-Forwarded-For` is used and a
/// missing or malformed header is an error (no fallback to the socket address).
/// Otherwise the peer address from `ConnectInfo` is used.
pub fn extract_client_ip<B>(
    request: &Request<B>,
    trust_forwarded_for: bool,
) -> Result<String, &'static str> {
    if trust_forwarded_for {
        let header_value = request
            .headers()
            .get(FORWARDED_FOR)
            .ok_or("IP header not present")?
            .to_str()
            .map_err(|_| "IP header contains invalid characters")?;
        let first = header_value.split(',').next().unwrap_or_default().trim();
        return first
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain an IP address");
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .ok_or("No client IP available")
}
