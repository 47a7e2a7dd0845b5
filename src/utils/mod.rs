//! # Utility Modules
//!
//! Supporting pieces outside the protocol core: tracing setup for the
//! binaries and `coap://` URI parsing for the client front end.

pub mod logging;
pub mod uri;
