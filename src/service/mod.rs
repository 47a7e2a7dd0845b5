//! # Session Layer
//!
//! Client and server sessions. Each owns one TCP connection, runs the
//! capability handshake before anything else, and then exchanges
//! messages strictly one at a time: the client correlates responses by
//! token, the server routes requests by exact URI path.

pub mod client;
pub mod server;
