//! # Protocol Layer
//!
//! The two-phase connection protocol: every connection starts in
//! `AWAITING_PEER_CAPABILITIES` and must complete the capability
//! exchange in [`handshake`] before any application message may flow.

pub mod handshake;

#[cfg(test)]
mod tests;
