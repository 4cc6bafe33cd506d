//! Frame encoding and reply decoding.
//!
//! # Frame Format
//!
//! ```text
//! :<cmd><axis>[<arg>]\r
//! ```
//!
//! - `<cmd>` one command letter (see [`Command`])
//! - `<axis>` `'1'` (RA) or `'2'` (DEC)
//! - `<arg>` optional hex argument: 2 digits for byte arguments, or 6 digits for
//!   24-bit values sent least significant byte first (`0x123456` is `563412`)
//!
//! # Reply Format
//!
//! - `=<payload>\r` success, payload may be empty
//! - `!<code>\r` rejected, code is a single optional digit
//!
//! Anything else is a protocol violation.

use crate::error::{MountError, MountResult};

use super::command::{ArgWidth, AxisId, Command};

/// Leading byte of every command frame.
pub const FRAME_MARKER: u8 = b':';

/// Terminator of command frames and replies.
pub const TERMINATOR: u8 = b'\r';

/// Leading byte of a successful reply.
pub const REPLY_OK: u8 = b'=';

/// Leading byte of a rejected command.
pub const REPLY_ERR: u8 = b'!';

/// Largest value representable in a 24-bit argument.
pub const MAX_U24: u32 = 0x00FF_FFFF;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// A command frame ready to be written to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub axis: AxisId,
    pub argument: Option<u32>,
}

impl Frame {
    pub fn new(command: Command, axis: AxisId) -> Self {
        Self {
            command,
            axis,
            argument: None,
        }
    }

    pub fn with_argument(command: Command, axis: AxisId, argument: u32) -> Self {
        Self {
            command,
            axis,
            argument: Some(argument),
        }
    }

    /// Serialize the frame, validating the argument against the command's width.
    pub fn encode(&self) -> MountResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(10);
        bytes.push(FRAME_MARKER);
        bytes.push(self.command.letter());
        bytes.push(self.axis.selector());

        match (self.command.argument(), self.argument) {
            (ArgWidth::None, None) => {}
            (ArgWidth::Byte, Some(value)) => {
                let byte = u8::try_from(value).map_err(|_| {
                    MountError::InvalidParameter(format!(
                        "{:?} argument {value} exceeds 8 bits",
                        self.command
                    ))
                })?;
                bytes.extend_from_slice(&encode_u8(byte));
            }
            (ArgWidth::Word24, Some(value)) => {
                if value > MAX_U24 {
                    return Err(MountError::InvalidParameter(format!(
                        "{:?} argument {value} exceeds 24 bits",
                        self.command
                    )));
                }
                bytes.extend_from_slice(&encode_u24(value));
            }
            (width, arg) => {
                return Err(MountError::InvalidParameter(format!(
                    "{:?} expects {width:?} argument, got {arg:?}",
                    self.command
                )))
            }
        }

        bytes.push(TERMINATOR);
        Ok(bytes)
    }

    /// Parse a command frame (the mock controller's side of the link).
    pub fn decode(bytes: &[u8]) -> MountResult<Self> {
        let body = strip_terminator(bytes)?;
        if body.len() < 3 || body[0] != FRAME_MARKER {
            return Err(MountError::Protocol(format!(
                "Malformed command frame {:?}",
                String::from_utf8_lossy(bytes)
            )));
        }
        let command = Command::from_letter(body[1]).ok_or_else(|| {
            MountError::Protocol(format!("Unknown command letter {:?}", body[1] as char))
        })?;
        let axis = AxisId::from_selector(body[2]).ok_or_else(|| {
            MountError::Protocol(format!("Unknown axis selector {:?}", body[2] as char))
        })?;
        let arg = &body[3..];
        let argument = match (command.argument(), arg.len()) {
            (ArgWidth::None, 0) => None,
            (ArgWidth::Byte, 2) => Some(decode_hex(arg)?),
            (ArgWidth::Word24, 6) => Some(decode_hex(arg)?),
            (_, len) => {
                return Err(MountError::Protocol(format!(
                    "Bad argument length {len} for {command:?}"
                )))
            }
        };
        Ok(Self {
            command,
            axis,
            argument,
        })
    }
}

/// A decoded controller reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `=` followed by a (possibly empty) payload.
    Ok(Vec<u8>),
    /// `!` followed by an optional error code digit.
    Rejected(Option<u8>),
}

impl Reply {
    /// Decode a reply read up to and including the terminator.
    pub fn decode(bytes: &[u8]) -> MountResult<Self> {
        let body = strip_terminator(bytes)?;
        match body.first() {
            Some(&REPLY_OK) => {
                let payload = &body[1..];
                if !payload.iter().all(u8::is_ascii_hexdigit) {
                    return Err(MountError::Protocol(format!(
                        "Non-hex reply payload {:?}",
                        String::from_utf8_lossy(payload)
                    )));
                }
                Ok(Reply::Ok(payload.to_vec()))
            }
            Some(&REPLY_ERR) => {
                let code = match &body[1..] {
                    [] => None,
                    [digit] => (*digit as char).to_digit(16).map(|d| d as u8),
                    other => {
                        return Err(MountError::Protocol(format!(
                            "Malformed error reply {:?}",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                Ok(Reply::Rejected(code))
            }
            Some(other) => Err(MountError::Protocol(format!(
                "Invalid leading byte 0x{other:02X}"
            ))),
            None => Err(MountError::Protocol("Empty reply".to_string())),
        }
    }

    /// Serialize the reply (the mock controller's side of the link).
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8);
        match self {
            Reply::Ok(payload) => {
                bytes.push(REPLY_OK);
                bytes.extend_from_slice(payload);
            }
            Reply::Rejected(code) => {
                bytes.push(REPLY_ERR);
                if let Some(code) = code {
                    bytes.push(HEX_DIGITS[(*code & 0x0F) as usize]);
                }
            }
        }
        bytes.push(TERMINATOR);
        bytes
    }

    /// Payload as a little-endian hex number (2, 4 or 6 digits).
    pub fn value(&self) -> MountResult<u32> {
        match self {
            Reply::Ok(payload) => decode_hex(payload),
            Reply::Rejected(_) => Err(MountError::Protocol(
                "Rejected reply carries no value".to_string(),
            )),
        }
    }
}

fn strip_terminator(bytes: &[u8]) -> MountResult<&[u8]> {
    match bytes.split_last() {
        Some((&TERMINATOR, body)) => Ok(body),
        _ => Err(MountError::Protocol(format!(
            "Truncated frame {:?}",
            String::from_utf8_lossy(bytes)
        ))),
    }
}

/// Encode a byte as two hex digits, high nibble first.
pub fn encode_u8(value: u8) -> [u8; 2] {
    [
        HEX_DIGITS[(value >> 4) as usize],
        HEX_DIGITS[(value & 0x0F) as usize],
    ]
}

/// Encode the low 24 bits of `value` as six hex digits, least significant byte first.
pub fn encode_u24(value: u32) -> [u8; 6] {
    let [b0, b1, b2, _] = value.to_le_bytes();
    let mut out = [0u8; 6];
    out[0..2].copy_from_slice(&encode_u8(b0));
    out[2..4].copy_from_slice(&encode_u8(b1));
    out[4..6].copy_from_slice(&encode_u8(b2));
    out
}

/// Decode 2, 4 or 6 hex digits stored least significant byte first.
pub fn decode_hex(digits: &[u8]) -> MountResult<u32> {
    if digits.is_empty() || digits.len() > 6 || digits.len() % 2 != 0 {
        return Err(MountError::Protocol(format!(
            "Hex value must be 2, 4 or 6 digits, got {:?}",
            String::from_utf8_lossy(digits)
        )));
    }
    let mut value = 0u32;
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        let text = std::str::from_utf8(pair)
            .map_err(|_| MountError::Protocol("Non-ASCII hex digits".to_string()))?;
        let byte = u8::from_str_radix(text, 16)
            .map_err(|_| MountError::Protocol(format!("Invalid hex digits {text:?}")))?;
        value |= u32::from(byte) << (8 * i);
    }
    Ok(value)
}
