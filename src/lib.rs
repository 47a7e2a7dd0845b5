//! # coap-tcp
//!
//! CoAP carried over TCP (in the style of RFC 8323): the message codec,
//! the mandatory capability-negotiation handshake, and client/server
//! session layers built on tokio.
//!
//! Unlike datagram CoAP, the byte-stream variant needs no ARQ machinery:
//! the transport is reliable and ordered, so a message is just a length
//! header, a code, a token, delta-compressed options, and an optional
//! payload. Every connection starts with a capability/settings (CSM)
//! exchange before any request may flow.
//!
//! ## Layers
//! - [`core`]: the [`Message`](core::message::Message) data model and the
//!   wire [`MessageCodec`](core::codec::MessageCodec)
//! - [`protocol`]: the capability handshake
//! - [`service`]: [`Client`](service::client::Client) and
//!   [`Server`](service::server::Server) sessions
//! - [`utils`]: logging setup and `coap://` URI parsing
//!
//! ## Example
//! ```no_run
//! use coap_tcp::service::client::Client;
//!
//! #[tokio::main]
//! async fn main() -> coap_tcp::error::Result<()> {
//!     let mut client = Client::connect("127.0.0.1:5683").await?;
//!     let response = client.get("/time").await?;
//!     println!("{}", String::from_utf8_lossy(&response.payload));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use crate::core::codec::MessageCodec;
pub use crate::core::message::{code, content_format, Capabilities, Message};
pub use crate::error::{ProtocolError, Result};
pub use crate::service::client::Client;
pub use crate::service::server::{Handler, Server};
