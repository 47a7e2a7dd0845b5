//! CoAP message representation: code, token, recognized options, payload.
//!
//! A [`Message`] is pure data plus formatting helpers; all wire logic
//! lives in [`crate::core::codec`]. Option fields are typed rather than
//! kept as a raw option list: this implementation recognizes
//! max-message-size (2), block-wise-transfer (4), uri-path (11),
//! content-format (12), and max-age (14), and silently skips the rest.

use crate::config::DEFAULT_MAX_AGE;
use std::fmt;

/// Message codes: `class << 5 | detail` (RFC 7252 §12.1.2, RFC 8323 §5.3).
pub mod code {
    pub const GET: u8 = 1;
    pub const POST: u8 = 2;
    pub const PUT: u8 = 3;
    pub const DELETE: u8 = 4;

    const C2XX: u8 = 2 << 5;
    const C4XX: u8 = 4 << 5;
    const C5XX: u8 = 5 << 5;
    const C7XX: u8 = 7 << 5;

    pub const CREATED_201: u8 = C2XX + 1;
    pub const DELETED_202: u8 = C2XX + 2;
    pub const VALID_203: u8 = C2XX + 3;
    pub const CHANGED_204: u8 = C2XX + 4;
    pub const CONTENT_205: u8 = C2XX + 5;

    pub const BAD_REQUEST_400: u8 = C4XX;
    pub const UNAUTHORIZED_401: u8 = C4XX + 1;
    pub const BAD_OPTION_402: u8 = C4XX + 2;
    pub const FORBIDDEN_403: u8 = C4XX + 3;
    pub const NOT_FOUND_404: u8 = C4XX + 4;
    pub const METHOD_NOT_ALLOWED_405: u8 = C4XX + 5;
    pub const NOT_ACCEPTABLE_406: u8 = C4XX + 6;
    pub const PRECONDITION_FAILED_412: u8 = C4XX + 12;
    pub const REQUEST_ENTITY_TOO_LARGE_413: u8 = C4XX + 13;
    pub const UNSUPPORTED_CONTENT_FORMAT_415: u8 = C4XX + 15;

    pub const INTERNAL_SERVER_ERROR_500: u8 = C5XX;
    pub const NOT_IMPLEMENTED_501: u8 = C5XX + 1;
    pub const BAD_GATEWAY_502: u8 = C5XX + 2;
    pub const SERVICE_UNAVAILABLE_503: u8 = C5XX + 3;
    pub const GATEWAY_TIMEOUT_504: u8 = C5XX + 4;
    pub const PROXYING_NOT_SUPPORTED_505: u8 = C5XX + 5;

    /// Capability/settings, the mandatory first message on a connection.
    pub const CSM_701: u8 = C7XX + 1;
    pub const PING_702: u8 = C7XX + 2;
    pub const PONG_703: u8 = C7XX + 3;
}

/// Content-format registry values (RFC 7252 §12.3).
pub mod content_format {
    pub const TEXT_PLAIN: u16 = 0;
    pub const APPLICATION_LINK_FORMAT: u16 = 40;
    pub const APPLICATION_XML: u16 = 41;
    pub const APPLICATION_OCTET_STREAM: u16 = 42;
    pub const APPLICATION_JSON: u16 = 50;
}

/// Peer limits advertised in a capability/settings (7.01) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub max_message_size: u32,
    pub block_wise_transfer: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_message_size: crate::config::DEFAULT_MAX_MESSAGE_SIZE,
            block_wise_transfer: false,
        }
    }
}

/// One protocol unit: code, token, recognized options, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Method, response, or signaling code (see [`code`])
    pub code: u8,
    /// Requester-chosen correlation bytes, 0-8 on the wire
    pub token: Vec<u8>,
    /// Payload bytes; empty means "no payload" (no 0xFF marker emitted)
    pub payload: Vec<u8>,
    /// Accumulated uri-path options as `/seg/seg`; empty means none
    pub uri_path: String,
    /// Content-format option; only values 0-255 are transmitted
    pub content_format: Option<u16>,
    /// Max-age option, elided on the wire at the default of 60
    pub max_age: u32,
    /// Capability options, only meaningful on CSM (7.01) messages
    pub capabilities: Option<Capabilities>,
}

impl Message {
    /// New message with defaulted options.
    pub fn new(code: u8, token: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            code,
            token,
            payload,
            uri_path: String::new(),
            content_format: None,
            max_age: DEFAULT_MAX_AGE,
            capabilities: None,
        }
    }

    /// Capability/settings message advertising `capabilities`.
    pub fn csm(capabilities: Capabilities) -> Self {
        let mut message = Self::new(code::CSM_701, Vec::new(), Vec::new());
        message.capabilities = Some(capabilities);
        message
    }

    /// Reply to this message: given code, same token, nothing else.
    pub fn response(&self, code: u8) -> Self {
        Self::new(code, self.token.clone(), Vec::new())
    }

    /// Whether the code is a request method (GET/POST/PUT/DELETE).
    pub fn is_method(&self) -> bool {
        (code::GET..=code::DELETE).contains(&self.code)
    }
}

/// Human-readable rendering of a code: method name or `class.detail`.
pub fn code_name(code: u8) -> String {
    match code {
        code::GET => "GET".to_string(),
        code::POST => "POST".to_string(),
        code::PUT => "PUT".to_string(),
        code::DELETE => "DELETE".to_string(),
        other => format!("{}.{:02}", other >> 5, other & 0x1F),
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", code_name(self.code))?;
        if !self.token.is_empty() {
            write!(f, ", token:")?;
            for byte in &self.token {
                write!(f, "{byte:02x}")?;
            }
        }
        if !self.uri_path.is_empty() {
            write!(f, ", uri:{}", self.uri_path)?;
        }
        if let Some(cf) = self.content_format {
            write!(f, ", ct:{cf}")?;
        }
        if self.max_age != DEFAULT_MAX_AGE {
            write!(f, ", max-age:{}", self.max_age)?;
        }
        if let Some(caps) = &self.capabilities {
            write!(
                f,
                ", max-msg-size:{}, block:{}",
                caps.max_message_size, caps.block_wise_transfer
            )?;
        }
        if !self.payload.is_empty() {
            write!(f, ", payload-len:{}", self.payload.len())?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_echoes_token() {
        let request = Message::new(code::GET, vec![0xAB, 0xCD], Vec::new());
        let response = request.response(code::NOT_FOUND_404);
        assert_eq!(response.code, code::NOT_FOUND_404);
        assert_eq!(response.token, vec![0xAB, 0xCD]);
        assert!(response.payload.is_empty());
        assert!(response.uri_path.is_empty());
    }

    #[test]
    fn method_predicate() {
        assert!(Message::new(code::GET, Vec::new(), Vec::new()).is_method());
        assert!(Message::new(code::DELETE, Vec::new(), Vec::new()).is_method());
        assert!(!Message::new(code::CONTENT_205, Vec::new(), Vec::new()).is_method());
        assert!(!Message::new(code::PING_702, Vec::new(), Vec::new()).is_method());
        assert!(!Message::new(0, Vec::new(), Vec::new()).is_method());
    }

    #[test]
    fn code_names() {
        assert_eq!(code_name(code::GET), "GET");
        assert_eq!(code_name(code::CONTENT_205), "2.05");
        assert_eq!(code_name(code::NOT_FOUND_404), "4.04");
        assert_eq!(code_name(code::CSM_701), "7.01");
    }

    #[test]
    fn display_includes_fields() {
        let mut message = Message::new(code::GET, vec![0x01], b"x".to_vec());
        message.uri_path = "/time".to_string();
        let text = message.to_string();
        assert!(text.contains("GET"));
        assert!(text.contains("token:01"));
        assert!(text.contains("uri:/time"));
        assert!(text.contains("payload-len:1"));
    }
}
