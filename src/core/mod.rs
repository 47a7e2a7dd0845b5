//! # Core Protocol Components
//!
//! The message data model and the wire codec.
//!
//! ## Wire Format
//! ```text
//! byte0:   [ Len(4 bits) | TKL(4 bits) ]
//! ext:     0, 1, 2, or 3 big-endian bytes depending on Len (13/14/15)
//! byte:    Code (class << 5 | detail)
//! bytes:   Token (TKL bytes)
//! bytes*:  Options, each: [delta(4b)|len(4b)] [delta-ext?] [len-ext?] value
//! byte:    0xFF marker (only if payload present)
//! bytes:   Payload (remainder)
//! ```

pub mod codec;
pub mod message;
