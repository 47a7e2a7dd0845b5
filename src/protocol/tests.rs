// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::codec::MessageCodec;
use crate::core::message::{code, Capabilities, Message};
use crate::error::ProtocolError;
use crate::protocol::handshake;
use futures::SinkExt;
use std::time::Duration;
use tokio_util::codec::Framed;

#[tokio::test]
async fn both_sides_negotiate() {
    let (near, far) = tokio::io::duplex(4096);
    let mut near = Framed::new(near, MessageCodec);
    let mut far = Framed::new(far, MessageCodec);

    let near_caps = Capabilities {
        max_message_size: 10_000,
        block_wise_transfer: false,
    };
    let far_caps = Capabilities {
        max_message_size: 2048,
        block_wise_transfer: true,
    };

    let (near_result, far_result) = tokio::join!(
        handshake::negotiate(&mut near, near_caps),
        handshake::negotiate(&mut far, far_caps),
    );

    assert_eq!(near_result.unwrap(), far_caps);
    assert_eq!(far_result.unwrap(), near_caps);
}

#[tokio::test]
async fn non_csm_first_message_is_a_violation() {
    let (near, far) = tokio::io::duplex(4096);
    let mut near = Framed::new(near, MessageCodec);
    let mut far = Framed::new(far, MessageCodec);

    // misbehaving peer opens with a ping instead of its CSM
    far.send(Message::new(code::PING_702, vec![0x01], Vec::new()))
        .await
        .unwrap();

    let result = handshake::negotiate(&mut near, Capabilities::default()).await;
    assert!(matches!(result, Err(ProtocolError::ProtocolViolation(_))));
}

#[tokio::test]
async fn csm_without_capability_option_is_a_violation() {
    let (near, far) = tokio::io::duplex(4096);
    let mut near = Framed::new(near, MessageCodec);
    let mut far = Framed::new(far, MessageCodec);

    // CSM code but no option 2 or 4 attached
    far.send(Message::new(code::CSM_701, Vec::new(), Vec::new()))
        .await
        .unwrap();

    let result = handshake::negotiate(&mut near, Capabilities::default()).await;
    assert!(matches!(result, Err(ProtocolError::ProtocolViolation(_))));
}

#[tokio::test]
async fn closed_transport_fails_negotiation() {
    let (near, far) = tokio::io::duplex(4096);
    drop(far);
    let mut near = Framed::new(near, MessageCodec);

    let result = handshake::negotiate(&mut near, Capabilities::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn silent_peer_times_out() {
    let (near, _far) = tokio::io::duplex(4096);
    let mut near = Framed::new(near, MessageCodec);

    let result = handshake::negotiate_with_timeout(
        &mut near,
        Capabilities::default(),
        Duration::from_millis(50),
    )
    .await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
