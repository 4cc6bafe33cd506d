//! Command letter table and axis selectors.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// One of the two mount axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum AxisId {
    /// Right ascension (polar) axis, selector `'1'`.
    #[strum(serialize = "RA")]
    Ra,
    /// Declination axis, selector `'2'`.
    #[strum(serialize = "DEC")]
    Dec,
}

impl AxisId {
    /// Selector character used in frames.
    pub fn selector(self) -> u8 {
        match self {
            AxisId::Ra => b'1',
            AxisId::Dec => b'2',
        }
    }

    pub fn from_selector(byte: u8) -> Option<Self> {
        match byte {
            b'1' => Some(AxisId::Ra),
            b'2' => Some(AxisId::Dec),
            _ => None,
        }
    }
}

/// Command letters understood by the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Command {
    /// `F` energise the motor and mark the axis initialized.
    Initialize,
    /// `e` motor board version; low byte is the mount type code.
    InquireMotorBoardVersion,
    /// `a` encoder steps per full revolution.
    InquireGridPerRevolution,
    /// `b` step timer interrupt frequency.
    InquireTimerInterruptFreq,
    /// `g` high speed ratio (steps per tick in high speed mode).
    InquireHighSpeedRatio,
    /// `L` stop immediately.
    InstantAxisStop,
    /// `K` decelerate to a stop.
    NotInstantAxisStop,
    /// `E` overwrite the encoder register.
    SetAxisPosition,
    /// `j` read the encoder register.
    GetAxisPosition,
    /// `f` read the axis status nibbles.
    GetAxisStatus,
    /// `G` set slew/goto mode, speed mode and direction.
    SetMotionMode,
    /// `H` relative goto target.
    SetGotoTargetIncrement,
    /// `M` steps before the target at which deceleration begins.
    SetBreakPointIncrement,
    /// `I` step period (timer ticks per step).
    SetStepPeriod,
    /// `J` start motion with the configured mode.
    StartMotion,
    /// `D` read the current step period.
    GetStepPeriod,
    /// `W` extended feature command.
    SetFeature,
    /// `q` extended feature query.
    GetFeature,
}

impl Command {
    /// Wire letter for this command.
    pub fn letter(self) -> u8 {
        match self {
            Command::Initialize => b'F',
            Command::InquireMotorBoardVersion => b'e',
            Command::InquireGridPerRevolution => b'a',
            Command::InquireTimerInterruptFreq => b'b',
            Command::InquireHighSpeedRatio => b'g',
            Command::InstantAxisStop => b'L',
            Command::NotInstantAxisStop => b'K',
            Command::SetAxisPosition => b'E',
            Command::GetAxisPosition => b'j',
            Command::GetAxisStatus => b'f',
            Command::SetMotionMode => b'G',
            Command::SetGotoTargetIncrement => b'H',
            Command::SetBreakPointIncrement => b'M',
            Command::SetStepPeriod => b'I',
            Command::StartMotion => b'J',
            Command::GetStepPeriod => b'D',
            Command::SetFeature => b'W',
            Command::GetFeature => b'q',
        }
    }

    pub fn from_letter(letter: u8) -> Option<Self> {
        use strum::IntoEnumIterator;
        Command::iter().find(|c| c.letter() == letter)
    }

    /// Width of the argument this command carries.
    pub fn argument(self) -> ArgWidth {
        match self {
            Command::SetMotionMode => ArgWidth::Byte,
            Command::SetAxisPosition
            | Command::SetGotoTargetIncrement
            | Command::SetBreakPointIncrement
            | Command::SetStepPeriod
            | Command::SetFeature
            | Command::GetFeature => ArgWidth::Word24,
            _ => ArgWidth::None,
        }
    }
}

/// Hex argument width of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgWidth {
    None,
    /// 2 hex digits
    Byte,
    /// 6 hex digits, least significant byte first
    Word24,
}

/// Sub-commands carried by [`Command::SetFeature`] and [`Command::GetFeature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Feature {
    /// Latch value of the home index sensor (query).
    GetHomeIndex,
    /// Clear the home index latch.
    ResetHomeIndex,
    /// Enable the auxiliary (axis) encoder.
    AuxEncoderOn,
    /// Disable the auxiliary (axis) encoder.
    AuxEncoderOff,
    /// Feature capability bits (query).
    GetFeatures,
}

impl Feature {
    pub fn code(self) -> u32 {
        match self {
            Feature::GetHomeIndex => 0x000000,
            Feature::GetFeatures => 0x000001,
            Feature::ResetHomeIndex => 0x000008,
            Feature::AuxEncoderOn => 0x000062,
            Feature::AuxEncoderOff => 0x000072,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x000000 => Some(Feature::GetHomeIndex),
            0x000001 => Some(Feature::GetFeatures),
            0x000008 => Some(Feature::ResetHomeIndex),
            0x000062 => Some(Feature::AuxEncoderOn),
            0x000072 => Some(Feature::AuxEncoderOff),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_letters_are_unique() {
        let letters: Vec<u8> = Command::iter().map(Command::letter).collect();
        for (i, a) in letters.iter().enumerate() {
            for b in &letters[i + 1..] {
                assert_ne!(a, b, "duplicate letter {}", *a as char);
            }
        }
    }

    #[test]
    fn test_letter_lookup() {
        for command in Command::iter() {
            assert_eq!(Command::from_letter(command.letter()), Some(command));
        }
        assert_eq!(Command::from_letter(b'z'), None);
    }

    #[test]
    fn test_axis_selectors() {
        assert_eq!(AxisId::from_selector(AxisId::Ra.selector()), Some(AxisId::Ra));
        assert_eq!(AxisId::from_selector(AxisId::Dec.selector()), Some(AxisId::Dec));
        assert_eq!(AxisId::from_selector(b'3'), None);
        assert_eq!(AxisId::Dec.to_string(), "DEC");
    }
}
