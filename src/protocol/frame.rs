//! # Command Frame Layout
//!
//! Byte layout of the 7-byte command frame and its ASCII wire form.
//!
//! | Byte | Field | Bits (7 = MSB) |
//! |------|-------|----------------|
//! | 0 | Header | safety-ok(7) \| frame-type(6-5) \| timestamp(4-2) \| reserved(1-0) |
//! | 1 | Velocity X | signed, -127..127 |
//! | 2 | Velocity Y | signed, -127..127 |
//! | 3 | Velocity yaw | signed, -127..127 |
//! | 4 | Discrete pack | wheel-speed(7-6) \| fire(5-4) \| lift(3-2) \| hand-forward(1) \| fire-angle(0) |
//! | 5 | Option pack | speed-mode(7) \| secondary-action(6-5) \| reserved(4-0) |
//! | 6 | Checksum | CRC-8 over bytes 0-5 |
//!
//! On the wire each byte becomes two lowercase hex digits, comma separated,
//! CR LF terminated: `86,3f,c1,7f,00,00,d7\r\n`.

use std::fmt;

use super::crc::frame_checksum;
use crate::error::{BridgeError, Result};

/// Frame length in bytes
pub const FRAME_LEN: usize = 7;

/// Frame type of a command frame
pub const FRAME_TYPE_COMMAND: u8 = 0x01;

/// Timestamp counter modulus (3-bit field)
pub const TIMESTAMP_MODULO: u8 = 8;

/// Highest wheel-speed level (2-bit field)
pub const WHEEL_SPEED_MAX: u8 = 3;

/// Largest velocity magnitude
pub const VELOCITY_LIMIT: i32 = 127;

/// Wire line terminator
pub const WIRE_TERMINATOR: &str = "\r\n";

/// Fire control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FireMode {
    #[default]
    Off = 0,
    Single = 1,
    Rapid = 2,
}

/// Lift control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LiftMode {
    #[default]
    Hold = 0,
    Raise = 1,
    Lower = 2,
}

/// Secondary mechanism control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SecondaryAction {
    #[default]
    Hold = 0,
    Advance = 1,
    Retreat = 2,
}

/// Body speed mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SpeedMode {
    #[default]
    Fast = 0,
    Reduced = 1,
}

/// Builds the header byte.
///
/// # Arguments
///
/// * `safety_stop` - `true` while the safety stop is active (clears bit 7)
/// * `frame_type` - 2-bit frame type
/// * `timestamp` - 3-bit rolling counter
///
/// # Examples
///
/// ```
/// use dualshock_bridge::protocol::frame::build_header;
///
/// assert_eq!(build_header(false, 1, 1), 0xA4);
/// assert_eq!(build_header(true, 1, 1), 0x24);
/// ```
#[must_use]
pub fn build_header(safety_stop: bool, frame_type: u8, timestamp: u8) -> u8 {
    let mut header = 0;
    header |= u8::from(!safety_stop) << 7;
    header |= (frame_type & 0x03) << 5;
    header |= (timestamp & 0x07) << 2;
    header
}

/// Builds the discrete pack (byte 4).
///
/// # Examples
///
/// ```
/// use dualshock_bridge::protocol::frame::build_discrete;
///
/// assert_eq!(build_discrete(3, 3, 3, 1, 1), 0xFF);
/// assert_eq!(build_discrete(0, 0, 0, 0, 0), 0x00);
/// ```
#[must_use]
pub fn build_discrete(wheel_speed: u8, fire: u8, lift: u8, hand_forward: u8, fire_angle: u8) -> u8 {
    let mut byte = 0;
    byte |= (wheel_speed & 0x03) << 6;
    byte |= (fire & 0x03) << 4;
    byte |= (lift & 0x03) << 2;
    byte |= (hand_forward & 0x01) << 1;
    byte |= fire_angle & 0x01;
    byte
}

/// Builds the option pack (byte 5). The low 5 bits are always zero.
#[must_use]
pub fn build_options(speed_mode: u8, secondary_action: u8) -> u8 {
    let mut byte = 0;
    byte |= (speed_mode & 0x01) << 7;
    byte |= (secondary_action & 0x03) << 5;
    byte
}

/// Converts a normalized stick value (0-255, center 128) to a duty in ≈ -1..1.
#[inline]
#[must_use]
pub fn stick_to_duty(value: i32) -> f64 {
    (f64::from(value) - 128.0) / 128.0
}

/// Converts a duty (-1.0..1.0) to a two's-complement velocity byte.
///
/// The duty is scaled by 127, rounded, and clamped to -127..127.
///
/// Rounding is half away from zero, so a duty of 0.5 encodes as 0x40. Senders
/// that truncate instead emit 0x3F for the same duty; receivers checked
/// against those byte values will see a one-step difference on such inputs.
///
/// # Examples
///
/// ```
/// use dualshock_bridge::protocol::frame::duty_to_signed_byte;
///
/// assert_eq!(duty_to_signed_byte(1.0), 0x7F);
/// assert_eq!(duty_to_signed_byte(-1.0), 0x81);
/// assert_eq!(duty_to_signed_byte(0.0), 0x00);
/// assert_eq!(duty_to_signed_byte(3.5), 0x7F);
/// assert_eq!(duty_to_signed_byte(0.5), 0x40);
/// ```
#[must_use]
pub fn duty_to_signed_byte(duty: f64) -> u8 {
    let limit = f64::from(VELOCITY_LIMIT);
    let value = (duty * limit).round().clamp(-limit, limit) as i8;
    value as u8
}

/// One encoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Wraps raw bytes as-is; byte 6 is not recomputed.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Assembles a frame from its six payload bytes and appends the checksum.
    #[must_use]
    pub fn with_checksum(payload: [u8; FRAME_LEN - 1]) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[..FRAME_LEN - 1].copy_from_slice(&payload);
        bytes[FRAME_LEN - 1] = frame_checksum(&bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Whether byte 6 matches the checksum of bytes 0-5.
    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        frame_checksum(&self.0) == self.0[FRAME_LEN - 1]
    }

    /// Renders the frame as wire text.
    ///
    /// # Examples
    ///
    /// ```
    /// use dualshock_bridge::protocol::frame::Frame;
    ///
    /// let frame = Frame::from_bytes([0x86, 0x3F, 0xC1, 0x7F, 0x00, 0x00, 0xA3]);
    /// assert_eq!(frame.to_wire(), "86,3f,c1,7f,00,00,a3\r\n");
    /// ```
    #[must_use]
    pub fn to_wire(&self) -> String {
        let mut text = self
            .0
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(",");
        text.push_str(WIRE_TERMINATOR);
        text
    }

    /// Parses one wire line back into a frame. The line terminator is optional;
    /// hex digits may be upper or lower case. The checksum is not verified here.
    ///
    /// # Errors
    ///
    /// `Protocol` if the line does not hold exactly seven 1-2 digit hex fields.
    pub fn from_wire(line: &str) -> Result<Self> {
        let body = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = body.split(',').collect();

        if fields.len() != FRAME_LEN {
            return Err(BridgeError::Protocol(format!(
                "expected {} fields, got {}",
                FRAME_LEN,
                fields.len()
            )));
        }

        let mut bytes = [0u8; FRAME_LEN];
        for (slot, field) in bytes.iter_mut().zip(&fields) {
            let field = field.trim();
            if field.is_empty() || field.len() > 2 {
                return Err(BridgeError::Protocol(format!("bad field '{}'", field)));
            }
            *slot = u8::from_str_radix(field, 16)
                .map_err(|e| BridgeError::Protocol(format!("bad field '{}': {}", field, e)))?;
        }

        Ok(Self(bytes))
    }

    /// Splits the frame back into its fields.
    #[must_use]
    pub fn fields(&self) -> FrameFields {
        let [header, vel_x, vel_y, vel_yaw, discrete, options, checksum] = self.0;
        FrameFields {
            safety_ok: header & 0x80 != 0,
            frame_type: (header >> 5) & 0x03,
            timestamp: (header >> 2) & 0x07,
            velocity_x: vel_x as i8,
            velocity_y: vel_y as i8,
            velocity_yaw: vel_yaw as i8,
            wheel_speed: (discrete >> 6) & 0x03,
            fire: (discrete >> 4) & 0x03,
            lift: (discrete >> 2) & 0x03,
            hand_forward: (discrete >> 1) & 0x01 != 0,
            fire_angle: discrete & 0x01 != 0,
            speed_mode: (options >> 7) & 0x01,
            secondary_action: (options >> 5) & 0x03,
            checksum,
            expected_checksum: frame_checksum(&self.0),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire().trim_end())
    }
}

/// Decoded view of a frame, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFields {
    pub safety_ok: bool,
    pub frame_type: u8,
    pub timestamp: u8,
    pub velocity_x: i8,
    pub velocity_y: i8,
    pub velocity_yaw: i8,
    pub wheel_speed: u8,
    pub fire: u8,
    pub lift: u8,
    pub hand_forward: bool,
    pub fire_angle: bool,
    pub speed_mode: u8,
    pub secondary_action: u8,
    pub checksum: u8,
    pub expected_checksum: u8,
}

impl fmt::Display for FrameFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ts={} stop={} type={} vel=({:+4},{:+4},{:+4}) wheel={} fire={} lift={} hand={} angle={} speed={} action={} crc=",
            self.timestamp,
            if self.safety_ok { "N" } else { "Y" },
            self.frame_type,
            self.velocity_x,
            self.velocity_y,
            self.velocity_yaw,
            self.wheel_speed,
            self.fire,
            self.lift,
            u8::from(self.hand_forward),
            u8::from(self.fire_angle),
            if self.speed_mode == 0 { "fast" } else { "reduced" },
            self.secondary_action,
        )?;
        if self.checksum == self.expected_checksum {
            f.write_str("OK")
        } else {
            write!(f, "NG(expected {:02x})", self.expected_checksum)
        }
    }
}
