//! Wire codec: frames [`Message`]s over any byte stream.
//!
//! [`MessageCodec`] implements tokio's [`Decoder`]/[`Encoder`] so it can
//! be driven by `Framed` over TCP, TLS, or an in-memory duplex. The
//! decoder consumes exactly one message per call and never reads past a
//! frame boundary: until a whole frame is buffered it returns `Ok(None)`.
//!
//! The options+payload length uses four tiers: a direct nibble for 0-12,
//! then 1/2/3 big-endian extension bytes with base offsets 13/269/65805.
//! Both directions implement all four tiers symmetrically, so messages
//! larger than 268 body bytes round-trip correctly.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::config::{DEFAULT_MAX_AGE, FALLBACK_MAX_MESSAGE_SIZE};
use crate::core::message::{code, Capabilities, Message};
use crate::error::{constants, ProtocolError, Result};

/// Separates options from payload; never appears in an option header.
const PAYLOAD_MARKER: u8 = 0xFF;

/// Wire format cap on token length (TKL nibble values 9-15 are reserved).
const MAX_TOKEN_LENGTH: usize = 8;

/// Size-tier base offsets: tier 13 adds one extension byte, tier 14 two,
/// tier 15 three.
const EXT1_BASE: usize = 13;
const EXT2_BASE: usize = 269;
const EXT3_BASE: usize = 65805;

/// Largest options+payload length the 3-byte extension can express.
const MAX_BODY_LENGTH: usize = EXT3_BASE + 0xFF_FFFF;

/// Stateless codec for CoAP-over-TCP messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if src.is_empty() {
            return Ok(None);
        }

        let size_code = src[0] >> 4;
        let token_length = (src[0] & 0x0F) as usize;
        if token_length > MAX_TOKEN_LENGTH {
            return Err(ProtocolError::InvalidTokenLength(token_length));
        }

        let ext_length = match size_code {
            0..=12 => 0,
            13 => 1,
            14 => 2,
            _ => 3,
        };
        if src.len() < 1 + ext_length {
            return Ok(None);
        }

        let body_length = match size_code {
            0..=12 => size_code as usize,
            13 => EXT1_BASE + src[1] as usize,
            14 => EXT2_BASE + u16::from_be_bytes([src[1], src[2]]) as usize,
            _ => EXT3_BASE + u32::from_be_bytes([0, src[1], src[2], src[3]]) as usize,
        };

        let frame_length = 1 + ext_length + 1 + token_length + body_length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(frame_length);
        frame.advance(1 + ext_length);
        let code = frame[0];
        let token = frame[1..1 + token_length].to_vec();
        frame.advance(1 + token_length);

        let message = parse_body(code, token, &frame)?;
        trace!(message = %message, "decoded");
        Ok(Some(message))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        if message.token.len() > MAX_TOKEN_LENGTH {
            return Err(ProtocolError::InvalidTokenLength(message.token.len()));
        }

        let options = encode_options(&message)?;
        let marker_length = usize::from(!message.payload.is_empty());
        let body_length = options.len() + marker_length + message.payload.len();
        if body_length > MAX_BODY_LENGTH {
            return Err(ProtocolError::OversizedMessage(body_length));
        }

        dst.reserve(4 + 1 + message.token.len() + body_length);

        let tkl = message.token.len() as u8;
        if body_length < EXT1_BASE {
            dst.put_u8((body_length as u8) << 4 | tkl);
        } else if body_length < EXT2_BASE {
            dst.put_u8(13 << 4 | tkl);
            dst.put_u8((body_length - EXT1_BASE) as u8);
        } else if body_length < EXT3_BASE {
            dst.put_u8(14 << 4 | tkl);
            dst.put_u16((body_length - EXT2_BASE) as u16);
        } else {
            dst.put_u8(15 << 4 | tkl);
            let ext = ((body_length - EXT3_BASE) as u32).to_be_bytes();
            dst.put_slice(&ext[1..]);
        }

        dst.put_u8(message.code);
        dst.put_slice(&message.token);
        dst.put_slice(&options);
        if !message.payload.is_empty() {
            dst.put_u8(PAYLOAD_MARKER);
            dst.put_slice(&message.payload);
        }

        Ok(())
    }
}

/// Parse options and payload out of the body region of one frame.
fn parse_body(code: u8, token: Vec<u8>, body: &[u8]) -> Result<Message> {
    let mut message = Message::new(code, token, Vec::new());
    let mut index = 0usize;
    let mut option_number = 0u32;

    while index < body.len() && body[index] != PAYLOAD_MARKER {
        let header = body[index];
        index += 1;
        let delta = decode_option_field(body, &mut index, header >> 4)?;
        let value_length = decode_option_field(body, &mut index, header & 0x0F)? as usize;

        if body.len() - index < value_length {
            return Err(ProtocolError::Format(format!(
                "option value of {value_length} bytes extends past message end"
            )));
        }
        option_number += delta;
        let value = &body[index..index + value_length];
        index += value_length;

        apply_option(&mut message, option_number, value)?;
    }

    if index < body.len() {
        message.payload = body[index + 1..].to_vec();
    }

    Ok(message)
}

/// Decode one delta or length nibble, pulling an extension byte for 13.
/// Nibbles 14 and 15 are reserved in option headers.
fn decode_option_field(body: &[u8], index: &mut usize, nibble: u8) -> Result<u32> {
    match nibble {
        0..=12 => Ok(u32::from(nibble)),
        13 => {
            let ext = *body
                .get(*index)
                .ok_or_else(|| ProtocolError::Format(constants::ERR_TRUNCATED_OPTION.into()))?;
            *index += 1;
            Ok(13 + u32::from(ext))
        }
        other => Err(ProtocolError::Format(format!(
            "reserved option header nibble {other}"
        ))),
    }
}

/// Dispatch one decoded option into the message's typed fields.
/// Unrecognized numbers are skipped for forward compatibility.
fn apply_option(message: &mut Message, number: u32, value: &[u8]) -> Result<()> {
    match number {
        2 if message.code == code::CSM_701 => {
            let size = decode_uint(value)?;
            match &mut message.capabilities {
                Some(caps) => caps.max_message_size = size,
                None => {
                    message.capabilities = Some(Capabilities {
                        max_message_size: size,
                        block_wise_transfer: false,
                    });
                }
            }
        }
        4 if message.code == code::CSM_701 => match &mut message.capabilities {
            Some(caps) => caps.block_wise_transfer = true,
            None => {
                // flag arrived without a size option: assume the RFC default
                message.capabilities = Some(Capabilities {
                    max_message_size: FALLBACK_MAX_MESSAGE_SIZE,
                    block_wise_transfer: true,
                });
            }
        },
        11 => {
            message.uri_path.push('/');
            message.uri_path.push_str(&String::from_utf8_lossy(value));
        }
        12 => {
            message.content_format = Some(match value {
                [] => 0,
                [byte] => u16::from(*byte),
                _ => {
                    return Err(ProtocolError::Format(
                        constants::ERR_CONTENT_FORMAT_TOO_LONG.into(),
                    ))
                }
            });
        }
        14 => message.max_age = decode_uint(value)?,
        _ => {}
    }
    Ok(())
}

/// Serialize the recognized options in strictly increasing number order:
/// 2, 4, 11 (repeated per path segment), 12, 14.
fn encode_options(message: &Message) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut last_number = 0u32;

    if let Some(caps) = &message.capabilities {
        write_option(&mut out, delta(&mut last_number, 2), &uint_bytes(caps.max_message_size))?;
        if caps.block_wise_transfer {
            write_option(&mut out, delta(&mut last_number, 4), &[])?;
        }
    }

    for segment in message.uri_path.split('/').filter(|s| !s.is_empty()) {
        write_option(&mut out, delta(&mut last_number, 11), segment.as_bytes())?;
    }

    if let Some(cf) = message.content_format {
        if cf > 0xFF {
            return Err(ProtocolError::InvalidContentFormat(cf));
        }
        write_option(&mut out, delta(&mut last_number, 12), &[cf as u8])?;
    }

    if message.max_age != DEFAULT_MAX_AGE {
        write_option(&mut out, delta(&mut last_number, 14), &uint_bytes(message.max_age))?;
    }

    Ok(out)
}

/// Delta from the previous option number; repeated numbers yield 0.
fn delta(last_number: &mut u32, number: u32) -> u32 {
    let d = number - *last_number;
    *last_number = number;
    d
}

/// Emit one option: header nibbles, extension bytes, value.
fn write_option(out: &mut Vec<u8>, delta: u32, value: &[u8]) -> Result<()> {
    let (delta_nibble, delta_ext) = encode_option_field(delta)?;
    let (length_nibble, length_ext) = encode_option_field(value.len() as u32)?;

    out.push(delta_nibble << 4 | length_nibble);
    if let Some(ext) = delta_ext {
        out.push(ext);
    }
    if let Some(ext) = length_ext {
        out.push(ext);
    }
    out.extend_from_slice(value);
    Ok(())
}

/// Nibble plus optional one-byte extension for a delta or length field.
fn encode_option_field(value: u32) -> Result<(u8, Option<u8>)> {
    match value {
        0..=12 => Ok((value as u8, None)),
        13..=268 => Ok((13, Some((value - 13) as u8))),
        other => Err(ProtocolError::Format(format!(
            "option field value {other} exceeds the one-byte extension range"
        ))),
    }
}

/// Minimal big-endian encoding: leading zero bytes stripped, zero itself
/// becomes an empty value.
pub(crate) fn uint_bytes(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Big-endian integer from a 0-4 byte option value.
fn decode_uint(value: &[u8]) -> Result<u32> {
    if value.len() > 4 {
        return Err(ProtocolError::Format(constants::ERR_UINT_TOO_LONG.into()));
    }
    Ok(value.iter().fold(0u32, |acc, b| acc << 8 | u32::from(*b)))
}
