//! End-to-end client/server exchanges over real TCP sockets.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Decoder, Encoder, Framed};

use coap_tcp::core::codec::MessageCodec;
use coap_tcp::core::message::{code, Capabilities, Message};
use coap_tcp::error::ProtocolError;
use coap_tcp::service::client::Client;
use coap_tcp::service::server::Server;

async fn spawn_server(server: Server) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    address
}

fn test_server() -> Server {
    let mut server = Server::new();
    server.register_fn("/test", |request| {
        let mut response = request.response(code::CONTENT_205);
        response.payload = b"test test".to_vec();
        response
    });
    server.register_get("/ro", |request| {
        let mut response = request.response(code::CONTENT_205);
        response.payload = b"read only".to_vec();
        response
    });
    server.register_fn("/echo", |request| {
        let mut response = request.response(code::CHANGED_204);
        response.payload = request.payload.clone();
        response
    });
    server.register_get("/big", |request| {
        let mut response = request.response(code::CONTENT_205);
        response.payload = vec![0x5A; 70_000];
        response
    });
    server
}

#[tokio::test]
async fn get_returns_handler_response() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();

    let response = client.get("/test").await.unwrap();
    assert_eq!(response.code, code::CONTENT_205);
    assert_eq!(response.payload, b"test test");
    // first token allocated on this connection
    assert_eq!(response.token, vec![0x01]);
}

#[tokio::test]
async fn unknown_path_yields_not_found() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();

    let response = client.get("/nowhere").await.unwrap();
    assert_eq!(response.code, code::NOT_FOUND_404);
    assert!(response.payload.is_empty());
}

#[tokio::test]
async fn ping_pong() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn get_only_route_rejects_put() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();

    let response = client.put("/ro", "overwrite").await.unwrap();
    assert_eq!(response.code, code::METHOD_NOT_ALLOWED_405);

    let response = client.get("/ro").await.unwrap();
    assert_eq!(response.code, code::CONTENT_205);
    assert_eq!(response.payload, b"read only");
}

#[tokio::test]
async fn post_and_delete() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();

    let response = client.post("/echo", "lorem ipsum").await.unwrap();
    assert_eq!(response.code, code::CHANGED_204);
    assert_eq!(response.payload, b"lorem ipsum");

    let response = client.delete("/echo").await.unwrap();
    assert_eq!(response.code, code::CHANGED_204);
    assert!(response.payload.is_empty());
}

#[tokio::test]
async fn large_response_crosses_size_tiers() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();

    let response = client.get("/big").await.unwrap();
    assert_eq!(response.payload.len(), 70_000);
    assert!(response.payload.iter().all(|b| *b == 0x5A));
}

#[tokio::test]
async fn sequential_requests_reuse_the_connection() {
    let address = spawn_server(test_server()).await;
    let mut client = Client::connect(&address.to_string()).await.unwrap();

    for expected_token in 1..=5u8 {
        let response = client.get("/test").await.unwrap();
        assert_eq!(response.token, vec![expected_token]);
        assert_eq!(response.payload, b"test test");
    }
    client.close().await.unwrap();
}

#[tokio::test]
async fn capabilities_are_negotiated() {
    let capabilities = Capabilities {
        max_message_size: 2048,
        block_wise_transfer: true,
    };
    let address = spawn_server(Server::with_capabilities(capabilities)).await;

    let client = Client::connect(&address.to_string()).await.unwrap();
    assert_eq!(client.peer_capabilities(), capabilities);
}

/// Accept one connection, complete the handshake, then hand the framed
/// stream to `session` so tests can script misbehaving peers.
async fn spawn_misbehaving_server<F, Fut>(session: F) -> SocketAddr
where
    F: FnOnce(Framed<TcpStream, MessageCodec>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, MessageCodec);
        framed
            .send(Message::csm(Capabilities::default()))
            .await
            .unwrap();
        let client_csm = framed.next().await.unwrap().unwrap();
        assert_eq!(client_csm.code, code::CSM_701);
        session(framed).await;
    });
    address
}

#[tokio::test]
async fn wrong_response_token_is_a_protocol_violation() {
    let address = spawn_misbehaving_server(|mut framed| async move {
        let request = framed.next().await.unwrap().unwrap();
        assert_eq!(request.code, code::GET);
        // reply with a token the client never issued
        let mut response = Message::new(code::CONTENT_205, vec![0xDE, 0xAD], Vec::new());
        response.payload = b"test test".to_vec();
        framed.send(response).await.unwrap();
    })
    .await;

    let mut client = Client::connect(&address.to_string()).await.unwrap();
    let result = client.get("/test").await;
    assert!(matches!(result, Err(ProtocolError::ProtocolViolation(_))));
}

#[tokio::test]
async fn non_pong_reply_to_ping_is_a_protocol_violation() {
    let address = spawn_misbehaving_server(|mut framed| async move {
        let ping = framed.next().await.unwrap().unwrap();
        assert_eq!(ping.code, code::PING_702);
        // right token, wrong code
        framed.send(ping.response(code::CONTENT_205)).await.unwrap();
    })
    .await;

    let mut client = Client::connect(&address.to_string()).await.unwrap();
    let result = client.ping().await;
    assert!(matches!(result, Err(ProtocolError::ProtocolViolation(_))));
}

#[tokio::test]
async fn server_drops_connection_on_skipped_handshake() {
    let address = spawn_server(test_server()).await;
    let mut stream = TcpStream::connect(address).await.unwrap();

    // a GET before any CSM violates the connection protocol
    let mut codec = MessageCodec;
    let mut buf = BytesMut::new();
    let mut request = Message::new(code::GET, vec![0x01], Vec::new());
    request.uri_path = "/test".to_string();
    codec.encode(request, &mut buf).unwrap();
    stream.write_all(&buf).await.unwrap();

    // the server sends its own CSM, then closes without dispatching
    let mut received = Vec::new();
    let mut chunk = vec![0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&chunk[..n]),
        }
    }

    let mut received = BytesMut::from(&received[..]);
    let first = codec.decode(&mut received).unwrap().unwrap();
    assert_eq!(first.code, code::CSM_701);
    assert!(received.is_empty(), "no application message was dispatched");
}
