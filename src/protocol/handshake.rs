//! Capability negotiation: the mandatory first exchange on a connection.
//!
//! Both sides send their own capability/settings (7.01) message
//! immediately after the transport is established, then block on the
//! peer's. A first message that is not a CSM, or a CSM carrying no
//! capability option, is a protocol violation and the caller must drop
//! the connection. Once negotiated, peer capabilities are immutable for
//! the connection's lifetime.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::core::codec::MessageCodec;
use crate::core::message::{code, Capabilities, Message};
use crate::error::{constants, ProtocolError, Result};

/// Exchange capabilities on a fresh connection.
///
/// Sends `local` as a CSM, then requires the next received message to be
/// the peer's CSM. Symmetric: both client and server run the same
/// negotiation.
pub async fn negotiate<T>(
    framed: &mut Framed<T, MessageCodec>,
    local: Capabilities,
) -> Result<Capabilities>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(Message::csm(local)).await?;

    let first = framed
        .next()
        .await
        .ok_or(ProtocolError::ConnectionClosed)??;
    debug!(message = %first, "handshake message received");

    if first.code != code::CSM_701 {
        return Err(ProtocolError::ProtocolViolation(
            constants::ERR_EXPECTED_CSM.into(),
        ));
    }
    first.capabilities.ok_or_else(|| {
        ProtocolError::ProtocolViolation(constants::ERR_MISSING_CAPABILITIES.into())
    })
}

/// [`negotiate`] with an upper bound on how long to wait for the peer's
/// CSM. The reference behavior is no timeout; this is opt-in hardening.
pub async fn negotiate_with_timeout<T>(
    framed: &mut Framed<T, MessageCodec>,
    local: Capabilities,
    timeout: Duration,
) -> Result<Capabilities>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, negotiate(framed, local))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}
