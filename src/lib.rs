//! # DualShock Bridge Library
//!
//! Drive a remote machine from a DualShock 4 or DualSense controller.
//!
//! Controller events are routed into a shared input state table, sampled at
//! 50 Hz, normalized per controller profile, and encoded into 7-byte
//! checksummed command frames that travel over a serial link as ASCII hex
//! lines.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod serial;
