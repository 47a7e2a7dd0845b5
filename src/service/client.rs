//! Client session: one connection, one in-flight request at a time.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::core::codec::{self, MessageCodec};
use crate::core::message::{code, content_format, Capabilities, Message};
use crate::error::{constants, ProtocolError, Result};

/// A negotiated client connection.
///
/// Construction dials and completes the capability handshake, so a
/// `Client` in hand always means application traffic is permitted.
/// Requests are strictly sequential; tokens come from a per-connection
/// monotonic counter and every response must echo the request's token.
///
/// Any error leaves the connection in an undefined state; drop the
/// client and reconnect.
pub struct Client {
    framed: Framed<TcpStream, MessageCodec>,
    peer_capabilities: Capabilities,
    next_token: u32,
    recv_timeout: Option<Duration>,
}

impl Client {
    /// Connect with default capabilities (10000-byte max message size).
    #[instrument]
    pub async fn connect(address: &str) -> Result<Self> {
        Self::connect_with_capabilities(address, Capabilities::default()).await
    }

    /// Connect, advertising `capabilities` in the client CSM.
    #[instrument(skip(capabilities))]
    pub async fn connect_with_capabilities(
        address: &str,
        capabilities: Capabilities,
    ) -> Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let mut framed = Framed::new(stream, MessageCodec);
        let peer_capabilities =
            crate::protocol::handshake::negotiate(&mut framed, capabilities).await?;
        debug!(
            max_message_size = peer_capabilities.max_message_size,
            block_wise = peer_capabilities.block_wise_transfer,
            "capabilities negotiated"
        );

        Ok(Self {
            framed,
            peer_capabilities,
            next_token: 0,
            recv_timeout: None,
        })
    }

    /// Bound every receive; the default is to block forever, matching
    /// the reference behavior.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Capabilities the server advertised during the handshake.
    pub fn peer_capabilities(&self) -> Capabilities {
        self.peer_capabilities
    }

    /// Send a signaling ping (7.02) and require a pong (7.03) back.
    pub async fn ping(&mut self) -> Result<()> {
        let mut ping = Message::new(code::PING_702, Vec::new(), Vec::new());
        ping.token = self.allocate_token();
        debug!(message = %ping, "sending ping");
        self.framed.send(ping).await?;

        let response = self.recv().await?;
        if response.code != code::PONG_703 {
            return Err(ProtocolError::ProtocolViolation(
                constants::ERR_EXPECTED_PONG.into(),
            ));
        }
        Ok(())
    }

    pub async fn get(&mut self, uri_path: &str) -> Result<Message> {
        self.request(code::GET, uri_path, None, Vec::new()).await
    }

    pub async fn post(&mut self, uri_path: &str, payload: impl Into<Vec<u8>>) -> Result<Message> {
        self.request(
            code::POST,
            uri_path,
            Some(content_format::TEXT_PLAIN),
            payload.into(),
        )
        .await
    }

    pub async fn put(&mut self, uri_path: &str, payload: impl Into<Vec<u8>>) -> Result<Message> {
        self.request(
            code::PUT,
            uri_path,
            Some(content_format::TEXT_PLAIN),
            payload.into(),
        )
        .await
    }

    pub async fn delete(&mut self, uri_path: &str) -> Result<Message> {
        self.request(code::DELETE, uri_path, None, Vec::new()).await
    }

    async fn request(
        &mut self,
        method: u8,
        uri_path: &str,
        content_format: Option<u16>,
        payload: Vec<u8>,
    ) -> Result<Message> {
        let mut request = Message::new(method, Vec::new(), payload);
        request.uri_path = uri_path.to_string();
        request.content_format = content_format;
        self.invoke(request).await
    }

    /// Send one request and read its response.
    ///
    /// Assigns the next token and enforces that the response echoes it;
    /// a mismatch is a protocol violation since only one request is ever
    /// in flight.
    pub async fn invoke(&mut self, mut request: Message) -> Result<Message> {
        request.token = self.allocate_token();
        let token = request.token.clone();
        debug!(message = %request, "sending request");
        self.framed.send(request).await?;

        let response = self.recv().await?;
        debug!(message = %response, "received response");
        if response.token != token {
            return Err(ProtocolError::ProtocolViolation(
                constants::ERR_TOKEN_MISMATCH.into(),
            ));
        }
        Ok(response)
    }

    /// Shut the connection down cleanly.
    pub async fn close(mut self) -> Result<()> {
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message> {
        let next = self.framed.next();
        let message = match self.recv_timeout {
            Some(limit) => tokio::time::timeout(limit, next)
                .await
                .map_err(|_| ProtocolError::Timeout)?,
            None => next.await,
        };
        message.ok_or(ProtocolError::ConnectionClosed)?
    }

    /// Minimal big-endian bytes of a strictly increasing counter, so
    /// client tokens are 1-4 bytes long.
    fn allocate_token(&mut self) -> Vec<u8> {
        self.next_token += 1;
        codec::uint_bytes(self.next_token)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer_capabilities", &self.peer_capabilities)
            .field("next_token", &self.next_token)
            .finish_non_exhaustive()
    }
}
