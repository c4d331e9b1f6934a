//! # Input Code Names
//!
//! Resolves the symbolic Linux input code names used in profile documents
//! (`"ABS_X"`, `"BTN_SOUTH"`, ...) to their integer codes. The table is plain
//! data built from the `evdev` constants; supporting another name is a one-line
//! addition here, not a code path.

use evdev::{AbsoluteAxisType, Key};

/// Namespace a raw code belongs to. Key and absolute-axis codes overlap
/// numerically, so routing always keys on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    /// EV_KEY
    Key,
    /// EV_ABS
    Absolute,
}

/// Raw code together with its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawCode {
    pub kind: CodeKind,
    pub code: u16,
}

impl RawCode {
    #[must_use]
    pub const fn key(code: u16) -> Self {
        Self {
            kind: CodeKind::Key,
            code,
        }
    }

    #[must_use]
    pub const fn absolute(code: u16) -> Self {
        Self {
            kind: CodeKind::Absolute,
            code,
        }
    }
}

const ABS_CODES: &[(&str, u16)] = &[
    ("ABS_X", AbsoluteAxisType::ABS_X.0),
    ("ABS_Y", AbsoluteAxisType::ABS_Y.0),
    ("ABS_Z", AbsoluteAxisType::ABS_Z.0),
    ("ABS_RX", AbsoluteAxisType::ABS_RX.0),
    ("ABS_RY", AbsoluteAxisType::ABS_RY.0),
    ("ABS_RZ", AbsoluteAxisType::ABS_RZ.0),
    ("ABS_THROTTLE", AbsoluteAxisType::ABS_THROTTLE.0),
    ("ABS_RUDDER", AbsoluteAxisType::ABS_RUDDER.0),
    ("ABS_GAS", AbsoluteAxisType::ABS_GAS.0),
    ("ABS_BRAKE", AbsoluteAxisType::ABS_BRAKE.0),
    ("ABS_HAT0X", AbsoluteAxisType::ABS_HAT0X.0),
    ("ABS_HAT0Y", AbsoluteAxisType::ABS_HAT0Y.0),
    ("ABS_HAT1X", AbsoluteAxisType::ABS_HAT1X.0),
    ("ABS_HAT1Y", AbsoluteAxisType::ABS_HAT1Y.0),
];

const KEY_CODES: &[(&str, u16)] = &[
    ("BTN_SOUTH", Key::BTN_SOUTH.code()),
    ("BTN_EAST", Key::BTN_EAST.code()),
    ("BTN_NORTH", Key::BTN_NORTH.code()),
    ("BTN_WEST", Key::BTN_WEST.code()),
    ("BTN_TL", Key::BTN_TL.code()),
    ("BTN_TR", Key::BTN_TR.code()),
    ("BTN_TL2", Key::BTN_TL2.code()),
    ("BTN_TR2", Key::BTN_TR2.code()),
    ("BTN_SELECT", Key::BTN_SELECT.code()),
    ("BTN_START", Key::BTN_START.code()),
    ("BTN_MODE", Key::BTN_MODE.code()),
    ("BTN_THUMBL", Key::BTN_THUMBL.code()),
    ("BTN_THUMBR", Key::BTN_THUMBR.code()),
    ("BTN_TOUCH", Key::BTN_TOUCH.code()),
    ("BTN_LEFT", Key::BTN_LEFT.code()),
    ("BTN_RIGHT", Key::BTN_RIGHT.code()),
    ("BTN_DPAD_UP", Key::BTN_DPAD_UP.code()),
    ("BTN_DPAD_DOWN", Key::BTN_DPAD_DOWN.code()),
    ("BTN_DPAD_LEFT", Key::BTN_DPAD_LEFT.code()),
    ("BTN_DPAD_RIGHT", Key::BTN_DPAD_RIGHT.code()),
];

/// Resolves an absolute-axis code name (`ABS_*`).
#[must_use]
pub fn absolute_code(name: &str) -> Option<u16> {
    lookup(ABS_CODES, name)
}

/// Resolves a key/button code name (`BTN_*`).
#[must_use]
pub fn key_code(name: &str) -> Option<u16> {
    lookup(KEY_CODES, name)
}

fn lookup(table: &[(&str, u16)], name: &str) -> Option<u16> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, code)| code)
}
