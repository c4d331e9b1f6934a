//! # Frame Checksum
//!
//! CRC-8 used by the receiving hardware.
//!
//! **Polynomial**: 0xEB
//! **Initial Value**: 0x00
//! **Shift rounds per byte**: 7
//! **Coverage**: frame bytes 0-5; the result is byte 6

/// Checksum polynomial
const CRC8_POLY: u8 = 0xEB;

/// Shift rounds applied per input byte
const CRC8_ROUNDS: u32 = 7;

/// Number of leading frame bytes covered by the checksum
pub const CHECKSUM_SPAN: usize = 6;

/// Precomputed lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
///
/// Each entry is the result of the 7 shift rounds applied to that byte value.
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < CRC8_ROUNDS {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the checksum of a byte slice using the lookup table
///
/// # Examples
///
/// ```
/// use dualshock_bridge::protocol::crc::crc8;
///
/// assert_eq!(crc8(&[0x00; 6]), 0x00);
/// assert_eq!(crc8(&[0x86, 0x3F, 0xC1, 0x7F, 0x00, 0x00]), 0xD7);
/// ```
#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }

    crc
}

/// Checksum of a 7-byte frame: covers bytes 0-5, ignores byte 6.
#[must_use]
pub fn frame_checksum(frame: &[u8; 7]) -> u8 {
    crc8(&frame[..CHECKSUM_SPAN])
}

/// Bit-by-bit reference implementation, used to verify the table
#[allow(dead_code)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..CRC8_ROUNDS {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
