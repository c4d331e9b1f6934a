//! # Control Loop
//!
//! Ties the controller side to the protocol side.
//!
//! This module handles:
//! - Event ingestion and the 50 Hz snapshot stream
//! - Device-loss fail-safe (neutral input while the controller is gone)
//! - Edge detection for the stop / resume / wheel bindings
//! - Transmit-rate gating and the per-mode drivers

pub mod driver;
pub mod edges;
pub mod reader;

pub use driver::{run_bridge, run_json, BridgeSettings, BridgeStats, DebugSink, LoopBindings};
pub use edges::{EdgeTracker, TransmitGate};
pub use reader::{ControllerReader, DeviceLiveness, SnapshotStream, StopHandle, SNAPSHOT_RATE_HZ};
