//! # Configuration Management
//!
//! Centralized configuration for servers and clients: listen address,
//! advertised capabilities, and the optional receive timeout.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`COAP_TCP_*` variables)
//!
//! Defaults preserve the reference behavior: port 5683, a 10000-byte
//! advertised max message size, no block-wise transfer, and no read
//! timeout.

use crate::core::message::Capabilities;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Default CoAP port, shared with the datagram variant.
pub const DEFAULT_PORT: u16 = 5683;

/// Max message size this implementation advertises in its CSM.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 10_000;

/// Max message size assumed for a peer whose CSM omitted the option
/// (RFC default).
pub const FALLBACK_MAX_MESSAGE_SIZE: u32 = 1152;

/// Default max-age option value; the option is elided on the wire when
/// a message carries this value.
pub const DEFAULT_MAX_AGE: u32 = 60;

/// Top-level configuration with server and client sections.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables, starting from defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("COAP_TCP_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(size) = std::env::var("COAP_TCP_MAX_MESSAGE_SIZE") {
            if let Ok(val) = size.parse::<u32>() {
                config.server.max_message_size = val;
                config.client.max_message_size = val;
            }
        }

        if let Ok(timeout) = std::env::var("COAP_TCP_RECV_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.client.recv_timeout_ms = Some(val);
            }
        }

        config
    }
}

/// Server section: listen address and advertised capabilities.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the accept loop binds to
    pub address: String,

    /// Max message size advertised in the server CSM
    pub max_message_size: u32,

    /// Whether the server CSM advertises block-wise transfer support
    pub block_wise_transfer: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            block_wise_transfer: false,
        }
    }
}

impl ServerConfig {
    /// Capabilities advertised during the handshake.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_message_size: self.max_message_size,
            block_wise_transfer: self.block_wise_transfer,
        }
    }
}

/// Client section: advertised capabilities and optional read timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Max message size advertised in the client CSM
    pub max_message_size: u32,

    /// Receive timeout in milliseconds; `None` blocks forever, matching
    /// the reference behavior
    pub recv_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            recv_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Capabilities advertised during the handshake.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_message_size: self.max_message_size,
            block_wise_transfer: false,
        }
    }

    /// Receive timeout as a `Duration`, if configured.
    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout_ms.map(Duration::from_millis)
    }
}
