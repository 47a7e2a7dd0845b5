//! Example resource server.
//!
//! Registers four resources: `/time` (GET-only, current UTC time),
//! `/my-ip` (the peer's address, via the trait-object handler variant),
//! `/echo` (any method, echoes the request payload back), and `/tmp`
//! (a mutable resource storing whatever was last PUT or POSTed).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use clap::Parser;

use coap_tcp::config::{NetworkConfig, DEFAULT_MAX_AGE};
use coap_tcp::core::message::{code, Message};
use coap_tcp::error::Result;
use coap_tcp::service::server::{Handler, Server};
use coap_tcp::utils::logging;

#[derive(Parser)]
#[command(name = "coap-server")]
#[command(about = "Example CoAP-over-TCP resource server", long_about = None)]
struct Cli {
    /// TOML config file; COAP_TCP_* environment variables apply otherwise
    #[arg(long)]
    config: Option<PathBuf>,
}

struct MyIpHandler;

impl Handler for MyIpHandler {
    fn handle(&self, peer: SocketAddr, request: &Message) -> Message {
        let mut response = request.response(code::CONTENT_205);
        response.payload = peer.ip().to_string().into_bytes();
        response
    }
}

/// Stored state of the `/tmp` resource.
struct StoredResource {
    payload: Vec<u8>,
    content_format: Option<u16>,
    max_age: u32,
}

impl Default for StoredResource {
    fn default() -> Self {
        Self {
            payload: Vec::new(),
            content_format: None,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

/// Mutable resource: GET reads the stored payload, PUT/POST replace it
/// (2.04), DELETE resets it (2.02). The routing table shares handlers
/// across connections, so the state sits behind a `Mutex`.
#[derive(Default)]
struct ReadWriteResource {
    stored: Mutex<StoredResource>,
}

impl Handler for ReadWriteResource {
    fn handle(&self, _peer: SocketAddr, request: &Message) -> Message {
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        match request.code {
            code::GET => {
                let mut response = request.response(code::CONTENT_205);
                response.payload = stored.payload.clone();
                response.content_format = stored.content_format;
                response.max_age = stored.max_age;
                response
            }
            code::PUT | code::POST => {
                stored.payload = request.payload.clone();
                stored.content_format = request.content_format;
                stored.max_age = request.max_age;
                request.response(code::CHANGED_204)
            }
            code::DELETE => {
                *stored = StoredResource::default();
                request.response(code::DELETED_202)
            }
            _ => request.response(code::INTERNAL_SERVER_ERROR_500),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::from_env(),
    };

    let mut server = Server::with_capabilities(config.server.capabilities());

    server.register_get("/time", |request| {
        let mut response = request.response(code::CONTENT_205);
        response.payload = Utc::now()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .into_bytes();
        response
    });

    server.register("/my-ip", MyIpHandler);

    server.register_fn("/echo", |request| {
        let mut response = request.response(code::CONTENT_205);
        response.payload = request.payload.clone();
        response.content_format = request.content_format;
        response
    });

    server.register("/tmp", ReadWriteResource::default());

    server.run(&config.server.address).await
}
