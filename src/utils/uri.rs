//! `coap://` URI parsing for the client front end.
//!
//! Accepts `coap://host[:port]/path`, `coap+tcp://` targets, or a bare
//! `host[:port]/path`; the default port 5683 is appended when missing.
//! IPv6 literals use URL bracket syntax, e.g. `coap://[::1]:5683/x`.

use crate::config::DEFAULT_PORT;
use crate::error::{ProtocolError, Result};

/// Parsed request target: dialable authority plus URI path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapUri {
    /// `host:port`, ready for `TcpStream::connect`
    pub authority: String,
    /// `/segment/segment`, possibly empty
    pub path: String,
}

/// Parse a request URI.
pub fn parse(uri: &str) -> Result<CoapUri> {
    let rest = uri
        .strip_prefix("coap://")
        .or_else(|| uri.strip_prefix("coap+tcp://"))
        .unwrap_or(uri);

    let (authority, path) = match rest.find('/') {
        Some(slash) => (&rest[..slash], rest[slash..].to_string()),
        None => (rest, String::new()),
    };

    let (host, port) = split_host_port(authority, uri)?;
    if host.is_empty() {
        return Err(ProtocolError::InvalidUri(format!("missing host in {uri:?}")));
    }

    let authority = match port {
        Some(port) => {
            if port.parse::<u16>().is_err() {
                return Err(ProtocolError::InvalidUri(format!(
                    "invalid port {port:?} in {uri:?}"
                )));
            }
            format!("{host}:{port}")
        }
        None => format!("{host}:{DEFAULT_PORT}"),
    };

    Ok(CoapUri { authority, path })
}

/// Split an authority into host and optional port. A bracketed IPv6
/// literal keeps its brackets so the result stays dialable.
fn split_host_port<'a>(
    authority: &'a str,
    uri: &str,
) -> Result<(std::borrow::Cow<'a, str>, Option<&'a str>)> {
    use std::borrow::Cow;

    if let Some(rest) = authority.strip_prefix('[') {
        let (addr, tail) = rest.split_once(']').ok_or_else(|| {
            ProtocolError::InvalidUri(format!("unclosed bracket in {uri:?}"))
        })?;
        if addr.is_empty() {
            return Ok((Cow::Borrowed(""), None));
        }
        let port = match tail {
            "" => None,
            tail => Some(tail.strip_prefix(':').ok_or_else(|| {
                ProtocolError::InvalidUri(format!("malformed authority in {uri:?}"))
            })?),
        };
        return Ok((Cow::Owned(format!("[{addr}]")), port));
    }

    Ok(match authority.rsplit_once(':') {
        Some((host, port)) => (Cow::Borrowed(host), Some(port)),
        None => (Cow::Borrowed(authority), None),
    })
}
