//! Solem wire protocol - command frames and commit
//!
//! Every command is a 7-byte big-endian frame:
//!
//! ```text
//! +---------+------------+----------+----------+
//! | 0x3105  | sub_opcode | field2   | field3   |
//! | u16     | u8         | u16      | u16      |
//! +---------+------------+----------+----------+
//! ```
//!
//! A command frame only stages the command. The device acts on it once the
//! 2-byte commit frame `3B 00` is written after it.

pub mod ble;

use std::fmt;

/// Opcode group shared by every command frame
pub const GROUP_ID: u16 = 0x3105;

/// Length of a command frame on the wire
pub const FRAME_LEN: usize = 7;

/// Commit frame, written after every command frame
pub const COMMIT_FRAME: [u8; 2] = [0x3B, 0x00];

// Sub-opcodes
pub const OP_POWER_ON: u8 = 0xA0;
pub const OP_POWER_OFF: u8 = 0xC0;
pub const OP_START_ALL_ZONES: u8 = 0x11;
pub const OP_START_ZONE: u8 = 0x12;
pub const OP_RUN_PROGRAM: u8 = 0x14;
pub const OP_STOP_WATERING: u8 = 0x15;

/// Longest manual watering the device accepts (12 hours)
pub const MAX_WATERING_SECS: u32 = 43_200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid argument: {field} = {value} exceeds maximum {max}")]
    InvalidArgument {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("frame must be 7 bytes, got {0}")]
    FrameLength(usize),
    #[error("unknown opcode group 0x{0:04x}")]
    UnknownGroup(u16),
    #[error("unknown sub-opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("sub-opcode 0x{sub_opcode:02x} with unexpected fields {field2:04x} {field3:04x}")]
    NonCanonical {
        sub_opcode: u8,
        field2: u16,
        field3: u16,
    },
}

/// Duration of a manual watering run, at most [`MAX_WATERING_SECS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WateringTime(u16);

impl WateringTime {
    pub const MAX: WateringTime = WateringTime(MAX_WATERING_SECS as u16);

    pub fn from_secs(secs: u32) -> Result<Self, CodecError> {
        if secs > MAX_WATERING_SECS {
            return Err(CodecError::InvalidArgument {
                field: "seconds",
                value: secs,
                max: MAX_WATERING_SECS,
            });
        }
        Ok(Self(secs as u16))
    }

    pub fn from_minutes(minutes: u32) -> Result<Self, CodecError> {
        Self::from_secs(minutes.saturating_mul(60))
    }

    pub fn as_secs(&self) -> u16 {
        self.0
    }
}

impl TryFrom<u32> for WateringTime {
    type Error = CodecError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::from_secs(secs)
    }
}

/// A controller command.
///
/// Timed variants carry a [`WateringTime`], so an out-of-range duration
/// cannot be represented and [`Command::encode`] never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PowerOn,
    PowerOff,
    /// Switch off for the given number of days (0 = permanently)
    DisableForDays(u8),
    /// Stop any manual watering
    StopWatering,
    StartAllZones(WateringTime),
    StartZone { zone: u8, duration: WateringTime },
    RunProgram(u16),
}

impl Command {
    /// Water every station for `secs` seconds.
    pub fn start_all_zones(secs: u32) -> Result<Self, CodecError> {
        Ok(Command::StartAllZones(WateringTime::from_secs(secs)?))
    }

    /// Water one station for `secs` seconds.
    pub fn start_zone(zone: u8, secs: u32) -> Result<Self, CodecError> {
        Ok(Command::StartZone {
            zone,
            duration: WateringTime::from_secs(secs)?,
        })
    }

    pub fn frame(&self) -> Frame {
        let (sub_opcode, field2, field3) = match *self {
            Command::PowerOn => (OP_POWER_ON, 0x0001, 0x0000),
            Command::PowerOff => (OP_POWER_OFF, 0x0000, 0x0000),
            Command::DisableForDays(days) => (OP_POWER_OFF, u16::from(days), 0x0000),
            Command::StopWatering => (OP_STOP_WATERING, 0x00FF, 0x0000),
            Command::StartAllZones(duration) => (OP_START_ALL_ZONES, 0x0000, duration.as_secs()),
            // zone id in the high byte, reserved zero in the low byte
            Command::StartZone { zone, duration } => {
                (OP_START_ZONE, u16::from(zone) << 8, duration.as_secs())
            }
            Command::RunProgram(program) => (OP_RUN_PROGRAM, program, 0x0000),
        };
        Frame {
            sub_opcode,
            field2,
            field3,
        }
    }

    /// Encode to the 7-byte wire frame.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        self.frame().to_bytes()
    }

    /// Map a decoded frame back to a command.
    ///
    /// `C0 0000` is reported as [`Command::PowerOff`]; on the wire it is the
    /// same as disabling for zero days. Constant and reserved fields must hold
    /// exactly the values [`Command::frame`] writes.
    pub fn from_frame(frame: &Frame) -> Result<Self, CodecError> {
        let command = match frame.sub_opcode {
            OP_POWER_ON => Command::PowerOn,
            OP_POWER_OFF if frame.field2 == 0 => Command::PowerOff,
            OP_POWER_OFF => {
                let days = u8::try_from(frame.field2).map_err(|_| CodecError::InvalidArgument {
                    field: "days",
                    value: u32::from(frame.field2),
                    max: u32::from(u8::MAX),
                })?;
                Command::DisableForDays(days)
            }
            OP_STOP_WATERING => Command::StopWatering,
            OP_START_ALL_ZONES => {
                Command::StartAllZones(WateringTime::from_secs(u32::from(frame.field3))?)
            }
            OP_START_ZONE => Command::StartZone {
                zone: (frame.field2 >> 8) as u8,
                duration: WateringTime::from_secs(u32::from(frame.field3))?,
            },
            OP_RUN_PROGRAM => Command::RunProgram(frame.field2),
            other => return Err(CodecError::UnknownOpcode(other)),
        };
        if command.frame() != *frame {
            return Err(CodecError::NonCanonical {
                sub_opcode: frame.sub_opcode,
                field2: frame.field2,
                field3: frame.field3,
            });
        }
        Ok(command)
    }

    /// Decode a raw 7-byte frame.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Self::from_frame(&Frame::from_bytes(data)?)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PowerOn => write!(f, "power on"),
            Command::PowerOff => write!(f, "power off"),
            Command::DisableForDays(days) => write!(f, "disable for {days} days"),
            Command::StopWatering => write!(f, "stop watering"),
            Command::StartAllZones(d) => write!(f, "water all zones for {}s", d.as_secs()),
            Command::StartZone { zone, duration } => {
                write!(f, "water zone {zone} for {}s", duration.as_secs())
            }
            Command::RunProgram(program) => write!(f, "run program {program}"),
        }
    }
}

/// The variable part of a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub sub_opcode: u8,
    pub field2: u16,
    pub field3: u16,
}

impl Frame {
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let group = GROUP_ID.to_be_bytes();
        let field2 = self.field2.to_be_bytes();
        let field3 = self.field3.to_be_bytes();
        [
            group[0],
            group[1],
            self.sub_opcode,
            field2[0],
            field2[1],
            field3[0],
            field3[1],
        ]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() != FRAME_LEN {
            return Err(CodecError::FrameLength(data.len()));
        }
        let group = u16::from_be_bytes([data[0], data[1]]);
        if group != GROUP_ID {
            return Err(CodecError::UnknownGroup(group));
        }
        Ok(Self {
            sub_opcode: data[2],
            field2: u16::from_be_bytes([data[3], data[4]]),
            field3: u16::from_be_bytes([data[5], data[6]]),
        })
    }
}

/// The commit frame that makes the device execute the staged command.
pub fn commit() -> [u8; 2] {
    COMMIT_FRAME
}
