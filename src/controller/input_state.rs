//! # Input State Table
//!
//! Holds the latest raw value of every canonical channel. The ingestion task
//! writes into it as events arrive; the snapshot tick copies the whole table
//! out under the same lock, so a snapshot is always one point in time.
//!
//! ## Usage
//!
//! ```
//! use dualshock_bridge::controller::channels::{Analog, Button};
//! use dualshock_bridge::controller::input_state::InputStateTable;
//!
//! let table = InputStateTable::new();
//! table.update_button(Button::Cross, 1);
//! table.update_analog(Analog::LeftX, 200);
//!
//! let snapshot = table.snapshot();
//! assert_eq!(snapshot.button(Button::Cross), 1);
//! assert_eq!(snapshot.analog(Analog::LeftX), 200);
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::channels::{Analog, Button, BUTTON_NEUTRAL};

/// Point-in-time copy of every channel value.
///
/// The same shape is used for raw snapshots (device-native analog ranges) and
/// normalized snapshots (analog values in 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSnapshot {
    buttons: [i32; Button::COUNT],
    analog: [i32; Analog::COUNT],
}

impl Default for InputSnapshot {
    fn default() -> Self {
        Self::neutral()
    }
}

impl InputSnapshot {
    /// Snapshot with every channel at its neutral value.
    #[must_use]
    pub fn neutral() -> Self {
        let mut analog = [0; Analog::COUNT];
        for axis in Analog::ALL {
            analog[axis.index()] = axis.neutral();
        }
        Self {
            buttons: [BUTTON_NEUTRAL; Button::COUNT],
            analog,
        }
    }

    #[inline]
    #[must_use]
    pub fn button(&self, button: Button) -> i32 {
        self.buttons[button.index()]
    }

    /// True when the discrete channel holds any non-zero value.
    #[inline]
    #[must_use]
    pub fn pressed(&self, button: Button) -> bool {
        self.button(button) != 0
    }

    #[inline]
    #[must_use]
    pub fn analog(&self, axis: Analog) -> i32 {
        self.analog[axis.index()]
    }

    pub fn set_button(&mut self, button: Button, value: i32) {
        self.buttons[button.index()] = value;
    }

    pub fn set_analog(&mut self, axis: Analog, value: i32) {
        self.analog[axis.index()] = value;
    }

    /// Iterates discrete channels in canonical order.
    pub fn buttons(&self) -> impl Iterator<Item = (Button, i32)> + '_ {
        Button::ALL.into_iter().map(move |b| (b, self.button(b)))
    }

    /// Iterates analog channels in canonical order.
    pub fn analogs(&self) -> impl Iterator<Item = (Analog, i32)> + '_ {
        Analog::ALL.into_iter().map(move |a| (a, self.analog(a)))
    }
}

struct ButtonMap<'a>(&'a InputSnapshot);
struct AnalogMap<'a>(&'a InputSnapshot);

impl Serialize for ButtonMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Button::COUNT))?;
        for (button, value) in self.0.buttons() {
            map.serialize_entry(button.as_str(), &value)?;
        }
        map.end()
    }
}

impl Serialize for AnalogMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Analog::COUNT))?;
        for (axis, value) in self.0.analogs() {
            map.serialize_entry(axis.as_str(), &value)?;
        }
        map.end()
    }
}

/// Serializes as `{"buttons": {name: value, ...}, "analog": {name: value, ...}}`
/// with channels in canonical order.
impl Serialize for InputSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("buttons", &ButtonMap(self))?;
        map.serialize_entry("analog", &AnalogMap(self))?;
        map.end()
    }
}

/// Shared table of the latest raw channel values.
///
/// # Thread Safety
///
/// Every operation takes the internal mutex for the duration of a single
/// assignment or copy. Normalization and encoding run on the copy returned by
/// [`InputStateTable::snapshot`], outside the lock. Values are stored without
/// validation.
#[derive(Debug)]
pub struct InputStateTable {
    state: Mutex<InputSnapshot>,
}

impl Default for InputStateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InputStateTable {
    /// Creates a table with every channel at its neutral value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InputSnapshot::neutral()),
        }
    }

    // A writer that panicked mid-assignment cannot leave a torn value behind,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, InputSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the latest value of a discrete channel.
    pub fn update_button(&self, button: Button, value: i32) {
        self.lock().set_button(button, value);
    }

    /// Records the latest raw value of an analog channel.
    pub fn update_analog(&self, axis: Analog, value: i32) {
        self.lock().set_analog(axis, value);
    }

    /// Writes both buttons of a d-pad pair under a single lock.
    pub fn update_button_pair(&self, first: (Button, i32), second: (Button, i32)) {
        let mut state = self.lock();
        state.set_button(first.0, first.1);
        state.set_button(second.0, second.1);
    }

    /// Copies out every channel value as of now.
    #[must_use]
    pub fn snapshot(&self) -> InputSnapshot {
        *self.lock()
    }

    /// Forces every channel back to neutral (fail-safe on device loss and stop).
    pub fn reset(&self) {
        *self.lock() = InputSnapshot::neutral();
    }
}
