//! Serial URL normalisation
//!
//! Early versions stored whatever the user typed as the connection target.
//! The current integration expects a pyserial-style URL, so a bare IPv4
//! address (with optional port) becomes `socket://<ip>:<port>`. Anything else
//! (serial device paths, `rfc2217://` URLs, typos) is left alone.

use std::net::Ipv4Addr;

use crate::consts::DEFAULT_YNCA_PORT;

/// Rewrite `ip[:port]` into a `socket://` URL, returning other input as is.
pub fn normalize_serial_url(raw: &str) -> String {
    socket_url(raw).unwrap_or_else(|| raw.to_string())
}

fn socket_url(raw: &str) -> Option<String> {
    let mut parts = raw.split(':');
    let ip: Ipv4Addr = parts.next()?.parse().ok()?;
    let port = match parts.next() {
        Some(port) => port.parse::<u16>().ok()?,
        None => DEFAULT_YNCA_PORT,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(format!("socket://{ip}:{port}"))
}
