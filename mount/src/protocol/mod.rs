//! Skywatcher motor controller wire protocol.
//!
//! The protocol is ASCII framed: each command is a marker, a command letter, an
//! axis selector and an optional hex argument, terminated by a carriage return.
//! Every command gets exactly one reply; there is no pipelining.

mod codec;
mod command;
mod status;

pub use codec::{
    decode_hex, encode_u24, encode_u8, Frame, Reply, FRAME_MARKER, MAX_U24, REPLY_ERR, REPLY_OK,
    TERMINATOR,
};
pub use command::{ArgWidth, AxisId, Command, Feature};
pub use status::{AxisStatus, Direction, MotionMode, SlewMode, SpeedMode};
