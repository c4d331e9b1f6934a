//! # Controller Module
//!
//! DualShock4 / DualSense input handling.
//!
//! This module handles:
//! - Controller detection and event reading via evdev
//! - Declarative capability profiles (raw code and calibration tables)
//! - The shared input state table and its snapshots
//! - Routing raw events to canonical channels
//! - Normalization and stick deadzones

pub mod channels;
pub mod codes;
pub mod device;
pub mod input_state;
pub mod mapper;
pub mod profile;
