//! Server session: accept loop, per-connection task, exact-path routing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument};

use crate::core::codec::MessageCodec;
use crate::core::message::{code, Capabilities, Message};
use crate::error::Result;
use crate::protocol::handshake;

/// A registered resource handler.
///
/// Handlers see the peer's address and the decoded request and must
/// produce a complete response message, token echoing included; start
/// from [`Message::response`].
pub trait Handler: Send + Sync {
    fn handle(&self, peer: SocketAddr, request: &Message) -> Message;
}

/// Closure adapter for handlers that ignore the peer address.
struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Message) -> Message + Send + Sync,
{
    fn handle(&self, _peer: SocketAddr, request: &Message) -> Message {
        (self.0)(request)
    }
}

/// Closure adapter that only serves GET and answers 4.05 otherwise.
struct GetHandlerFn<F>(F);

impl<F> Handler for GetHandlerFn<F>
where
    F: Fn(&Message) -> Message + Send + Sync,
{
    fn handle(&self, _peer: SocketAddr, request: &Message) -> Message {
        if request.code == code::GET {
            (self.0)(request)
        } else {
            request.response(code::METHOD_NOT_ALLOWED_405)
        }
    }
}

type Routes = HashMap<String, Box<dyn Handler>>;

/// CoAP-over-TCP server.
///
/// Routes are registered before the accept loop starts and are read-only
/// afterwards, so connections share them through an `Arc` without
/// locking. Each accepted connection gets its own task running a fully
/// sequential negotiate-read-respond loop; concurrency across
/// connections is unbounded.
pub struct Server {
    routes: Routes,
    capabilities: Capabilities,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Server advertising the default capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::default())
    }

    /// Server advertising `capabilities` in its CSM.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            routes: HashMap::new(),
            capabilities,
        }
    }

    /// Register a handler for an exact URI path.
    pub fn register(&mut self, uri_path: &str, handler: impl Handler + 'static) {
        self.routes.insert(uri_path.to_string(), Box::new(handler));
    }

    /// Register a closure serving every method on `uri_path`.
    pub fn register_fn<F>(&mut self, uri_path: &str, handler: F)
    where
        F: Fn(&Message) -> Message + Send + Sync + 'static,
    {
        self.register(uri_path, HandlerFn(handler));
    }

    /// Register a GET-only closure; other methods get 4.05 automatically.
    pub fn register_get<F>(&mut self, uri_path: &str, handler: F)
    where
        F: Fn(&Message) -> Message + Send + Sync + 'static,
    {
        self.register(uri_path, GetHandlerFn(handler));
    }

    /// Bind `address` and serve forever.
    pub async fn run(self, address: &str) -> Result<()> {
        let listener = TcpListener::bind(address).await?;
        info!(address = %listener.local_addr()?, "listening");
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let routes = Arc::new(self.routes);
        let capabilities = self.capabilities;

        loop {
            let (stream, peer) = listener.accept().await?;
            let routes = routes.clone();
            tokio::spawn(async move {
                if let Err(error) = handle_connection(routes, capabilities, stream, peer).await {
                    debug!(peer = %peer, error = %error, "disconnecting");
                }
            });
        }
    }
}

/// One connection's lifetime: handshake, then a sequential
/// request/response loop until the peer goes away or misbehaves.
#[instrument(skip_all, fields(peer = %peer))]
async fn handle_connection(
    routes: Arc<Routes>,
    capabilities: Capabilities,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    info!("connected");
    let mut framed = Framed::new(stream, MessageCodec);

    let peer_capabilities = handshake::negotiate(&mut framed, capabilities).await?;
    debug!(
        max_message_size = peer_capabilities.max_message_size,
        block_wise = peer_capabilities.block_wise_transfer,
        "capabilities negotiated"
    );

    while let Some(request) = framed.next().await {
        let request = request?;
        debug!(message = %request, "received");

        if let Some(response) = dispatch(&routes, peer, &request) {
            debug!(message = %response, "sending");
            framed.send(response).await?;
        }
    }
    Ok(())
}

/// Routing rule: ping begets pong, methods go through the path table
/// (4.04 for unknown paths), everything else is silently ignored.
fn dispatch(routes: &Routes, peer: SocketAddr, request: &Message) -> Option<Message> {
    if request.code == code::PING_702 {
        return Some(request.response(code::PONG_703));
    }
    if !request.is_method() {
        return None;
    }

    let response = match routes.get(&request.uri_path) {
        Some(handler) => handler.handle(peer, request),
        None => request.response(code::NOT_FOUND_404),
    };
    Some(response)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:49152".parse().unwrap()
    }

    fn routes_with_test_handler() -> Routes {
        let mut server = Server::new();
        server.register_fn("/test", |request| {
            let mut response = request.response(code::CONTENT_205);
            response.payload = b"test test".to_vec();
            response
        });
        server.routes
    }

    #[test]
    fn ping_begets_pong() {
        let routes = Routes::new();
        let ping = Message::new(code::PING_702, vec![0x07], Vec::new());
        let pong = dispatch(&routes, peer(), &ping).unwrap();
        assert_eq!(pong.code, code::PONG_703);
        assert_eq!(pong.token, vec![0x07]);
        assert!(pong.payload.is_empty());
        assert!(pong.uri_path.is_empty());
        assert_eq!(pong.content_format, None);
    }

    #[test]
    fn unknown_path_answers_not_found() {
        let routes = routes_with_test_handler();
        let mut request = Message::new(code::GET, vec![0x42], Vec::new());
        request.uri_path = "/missing".to_string();
        let response = dispatch(&routes, peer(), &request).unwrap();
        assert_eq!(response.code, code::NOT_FOUND_404);
        assert_eq!(response.token, vec![0x42]);
        assert!(response.payload.is_empty());
    }

    #[test]
    fn registered_path_dispatches_to_handler() {
        let routes = routes_with_test_handler();
        let mut request = Message::new(code::GET, vec![0x01], Vec::new());
        request.uri_path = "/test".to_string();
        let response = dispatch(&routes, peer(), &request).unwrap();
        assert_eq!(response.code, code::CONTENT_205);
        assert_eq!(response.payload, b"test test");
    }

    #[test]
    fn non_method_non_ping_is_ignored() {
        let routes = routes_with_test_handler();
        let stray = Message::new(code::CONTENT_205, vec![0x01], b"late".to_vec());
        assert!(dispatch(&routes, peer(), &stray).is_none());
    }

    #[test]
    fn get_only_handler_rejects_other_methods() {
        let mut server = Server::new();
        server.register_get("/ro", |request| {
            let mut response = request.response(code::CONTENT_205);
            response.payload = b"value".to_vec();
            response
        });

        let mut get = Message::new(code::GET, vec![0x01], Vec::new());
        get.uri_path = "/ro".to_string();
        let response = dispatch(&server.routes, peer(), &get).unwrap();
        assert_eq!(response.code, code::CONTENT_205);

        let mut put = Message::new(code::PUT, vec![0x02], b"x".to_vec());
        put.uri_path = "/ro".to_string();
        let response = dispatch(&server.routes, peer(), &put).unwrap();
        assert_eq!(response.code, code::METHOD_NOT_ALLOWED_405);
        assert_eq!(response.token, vec![0x02]);
    }
}
