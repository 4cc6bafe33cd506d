//! Typed axis status.
//!
//! The controller reports status as three hex nibbles:
//!
//! ```text
//! nibble 0: bit0 = slew mode (1) / goto mode (0)
//!           bit1 = backward (1) / forward (0)
//!           bit2 = high speed (1) / low speed (0)
//! nibble 1: bit0 = running, bit1 = blocked
//! nibble 2: bit0 = initialized, bit1 = level switch on
//! ```
//!
//! Mode, direction and speed are also what [`Command::SetMotionMode`](super::Command)
//! writes, packed into one byte: high nibble is the mode digit, low nibble the
//! direction digit.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{MountError, MountResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SlewMode {
    /// Continuous motion at the configured step period.
    Slew,
    /// Relative move to a target increment.
    Goto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn from_sign(value: f64) -> Self {
        if value < 0.0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SpeedMode {
    Low,
    High,
}

/// Requested motion configuration for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionMode {
    pub slew_mode: SlewMode,
    pub direction: Direction,
    pub speed_mode: SpeedMode,
}

impl MotionMode {
    pub fn new(slew_mode: SlewMode, direction: Direction, speed_mode: SpeedMode) -> Self {
        Self {
            slew_mode,
            direction,
            speed_mode,
        }
    }

    /// Encode as the `G` argument byte.
    pub fn to_byte(self) -> u8 {
        let mode = match (self.slew_mode, self.speed_mode) {
            (SlewMode::Goto, SpeedMode::High) => 0,
            (SlewMode::Slew, SpeedMode::Low) => 1,
            (SlewMode::Goto, SpeedMode::Low) => 2,
            (SlewMode::Slew, SpeedMode::High) => 3,
        };
        let direction = match self.direction {
            Direction::Forward => 0,
            Direction::Backward => 1,
        };
        (mode << 4) | direction
    }

    pub fn from_byte(byte: u8) -> MountResult<Self> {
        let (slew_mode, speed_mode) = match byte >> 4 {
            0 => (SlewMode::Goto, SpeedMode::High),
            1 => (SlewMode::Slew, SpeedMode::Low),
            2 => (SlewMode::Goto, SpeedMode::Low),
            3 => (SlewMode::Slew, SpeedMode::High),
            other => {
                return Err(MountError::Protocol(format!(
                    "Invalid motion mode digit {other}"
                )))
            }
        };
        let direction = match byte & 0x0F {
            0 => Direction::Forward,
            1 => Direction::Backward,
            other => {
                return Err(MountError::Protocol(format!(
                    "Invalid direction digit {other}"
                )))
            }
        };
        Ok(Self::new(slew_mode, direction, speed_mode))
    }

    /// True if switching from `self` to `other` needs the axis stopped first.
    pub fn differs_from(&self, other: &MotionMode) -> bool {
        self != other
    }
}

/// Status of one axis as last reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisStatus {
    pub initialized: bool,
    pub running: bool,
    pub blocked: bool,
    pub mode: MotionMode,
}

impl Default for AxisStatus {
    fn default() -> Self {
        Self {
            initialized: false,
            running: false,
            blocked: false,
            mode: MotionMode::new(SlewMode::Slew, Direction::Forward, SpeedMode::Low),
        }
    }
}

impl AxisStatus {
    /// Decode the three-nibble status payload.
    pub fn from_payload(payload: &[u8]) -> MountResult<Self> {
        if payload.len() != 3 {
            return Err(MountError::Protocol(format!(
                "Status payload must be 3 digits, got {}",
                payload.len()
            )));
        }
        let nibble = |b: u8| {
            (b as char)
                .to_digit(16)
                .ok_or_else(|| MountError::Protocol(format!("Invalid status digit {:?}", b as char)))
        };
        let mode_bits = nibble(payload[0])?;
        let run_bits = nibble(payload[1])?;
        let init_bits = nibble(payload[2])?;

        let slew_mode = if mode_bits & 0x1 != 0 {
            SlewMode::Slew
        } else {
            SlewMode::Goto
        };
        let direction = if mode_bits & 0x2 != 0 {
            Direction::Backward
        } else {
            Direction::Forward
        };
        let speed_mode = if mode_bits & 0x4 != 0 {
            SpeedMode::High
        } else {
            SpeedMode::Low
        };

        Ok(Self {
            initialized: init_bits & 0x1 != 0,
            running: run_bits & 0x1 != 0,
            blocked: run_bits & 0x2 != 0,
            mode: MotionMode::new(slew_mode, direction, speed_mode),
        })
    }

    /// Encode as the three-nibble status payload.
    pub fn to_payload(&self) -> [u8; 3] {
        let mut mode_bits = 0u8;
        if self.mode.slew_mode == SlewMode::Slew {
            mode_bits |= 0x1;
        }
        if self.mode.direction == Direction::Backward {
            mode_bits |= 0x2;
        }
        if self.mode.speed_mode == SpeedMode::High {
            mode_bits |= 0x4;
        }
        let run_bits = u8::from(self.running) | (u8::from(self.blocked) << 1);
        let init_bits = u8::from(self.initialized);
        let hex = |n: u8| b"0123456789ABCDEF"[n as usize];
        [hex(mode_bits), hex(run_bits), hex(init_bits)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_mode_bytes() {
        let goto_high = MotionMode::new(SlewMode::Goto, Direction::Forward, SpeedMode::High);
        assert_eq!(goto_high.to_byte(), 0x00);
        let slew_low_back = MotionMode::new(SlewMode::Slew, Direction::Backward, SpeedMode::Low);
        assert_eq!(slew_low_back.to_byte(), 0x11);
        let goto_low = MotionMode::new(SlewMode::Goto, Direction::Backward, SpeedMode::Low);
        assert_eq!(goto_low.to_byte(), 0x21);
        assert_eq!(MotionMode::from_byte(0x30).unwrap().speed_mode, SpeedMode::High);
        assert!(MotionMode::from_byte(0x40).is_err());
        assert!(MotionMode::from_byte(0x02).is_err());
    }

    #[test]
    fn test_status_decode() {
        // slew, backward, high speed; running; initialized
        let status = AxisStatus::from_payload(b"711").unwrap();
        assert!(status.running);
        assert!(status.initialized);
        assert!(!status.blocked);
        assert_eq!(status.mode.slew_mode, SlewMode::Slew);
        assert_eq!(status.mode.direction, Direction::Backward);
        assert_eq!(status.mode.speed_mode, SpeedMode::High);

        let idle = AxisStatus::from_payload(b"000").unwrap();
        assert!(!idle.running);
        assert!(!idle.initialized);
        assert_eq!(idle.mode.slew_mode, SlewMode::Goto);
    }

    #[test]
    fn test_status_rejects_garbage() {
        assert!(AxisStatus::from_payload(b"7G1").is_err());
        assert!(AxisStatus::from_payload(b"71").is_err());
    }

    #[test]
    fn test_status_payload_inverse() {
        let status = AxisStatus {
            initialized: true,
            running: false,
            blocked: true,
            mode: MotionMode::new(SlewMode::Goto, Direction::Backward, SpeedMode::High),
        };
        let payload = status.to_payload();
        assert_eq!(&payload, b"621");
        assert_eq!(AxisStatus::from_payload(&payload).unwrap(), status);
    }
}
