//! # Command Frame Protocol
//!
//! 7-byte checksummed command frames sent to the vehicle as ASCII hex lines.
//!
//! This module handles:
//! - CRC-8 checksum (poly 0xEB, 7 rounds per byte)
//! - Frame layout, byte builders and wire text
//! - Stateful encoding of normalized snapshots

pub mod crc;
pub mod encoder;
pub mod frame;

pub use encoder::FrameEncoder;
pub use frame::{Frame, FrameFields};
