//! # Channel Mapper / Normalizer
//!
//! Two jobs, one on each side of the [`InputStateTable`]:
//!
//! - **Routing** (ingestion side): a [`RoutingTable`] built from a profile tells
//!   the event loop which canonical channel a raw code feeds. Hat-style d-pad
//!   axes are decoded here into mutually exclusive button pairs.
//! - **Normalization** (snapshot side): [`Normalizer::normalize`] rescales
//!   every calibrated analog channel to 0-255 and collapses stick values near
//!   center to exactly 128.
//!
//! ## Usage
//!
//! ```
//! use dualshock_bridge::controller::channels::Analog;
//! use dualshock_bridge::controller::input_state::InputStateTable;
//! use dualshock_bridge::controller::mapper::{Normalizer, RoutingTable};
//! use dualshock_bridge::controller::profile::ProfileRegistry;
//! use dualshock_bridge::controller::device::{EventKind, RawEvent};
//!
//! let registry = ProfileRegistry::builtin()?;
//! let profile = registry.get("DualShock4")?;
//! let routing = RoutingTable::build(profile);
//! let table = InputStateTable::new();
//!
//! // Left stick pushed slightly right of center: inside the deadzone
//! routing.apply(&table, &RawEvent::new(EventKind::Absolute, 0x00, 133));
//!
//! let normalizer = Normalizer::new(profile.clone(), 10);
//! let snapshot = normalizer.normalize(&table.snapshot());
//! assert_eq!(snapshot.analog(Analog::LeftX), 128);
//! # Ok::<(), dualshock_bridge::error::BridgeError>(())
//! ```

use std::collections::HashMap;
use tracing::trace;

use super::channels::{AnalogFamily, Channel, HatAxis, STICK_NEUTRAL};
use super::codes::RawCode;
use super::device::{EventKind, RawEvent};
use super::input_state::{InputSnapshot, InputStateTable};
use super::profile::{DeviceProfile, DpadMode};

/// Lowest normalized analog value.
pub const NORMALIZED_MIN: i32 = 0;
/// Highest normalized analog value.
pub const NORMALIZED_MAX: i32 = 255;
/// Normalized value used when a calibration range is empty.
pub const NORMALIZED_MIDPOINT: i32 = 128;

/// D-pad hat values.
pub const HAT_NEGATIVE: i32 = -1;
/// D-pad hat released.
pub const HAT_RELEASED: i32 = 0;
/// D-pad hat positive direction (right or down).
pub const HAT_POSITIVE: i32 = 1;

/// Lookup from raw input code to canonical channel.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<RawCode, Channel>,
}

impl RoutingTable {
    /// Builds the routing table for a profile.
    #[must_use]
    pub fn build(profile: &DeviceProfile) -> Self {
        let mut routes = HashMap::new();

        for &(button, code) in profile.buttons() {
            routes.insert(RawCode::key(code), Channel::Discrete(button));
        }

        for axis in profile.axes() {
            routes.insert(RawCode::absolute(axis.code), Channel::Continuous(axis.channel));
        }

        if let DpadMode::Hat { x, y } = profile.dpad() {
            routes.insert(RawCode::absolute(x), Channel::CrossAxis(HatAxis::X));
            routes.insert(RawCode::absolute(y), Channel::CrossAxis(HatAxis::Y));
        }

        Self { routes }
    }

    /// Channel a raw code is routed to, if any.
    #[must_use]
    pub fn route(&self, code: RawCode) -> Option<Channel> {
        self.routes.get(&code).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Writes one raw event into the table.
    ///
    /// Only key and absolute events with a known code are applied; everything
    /// else (sync reports, gyro axes, unmapped buttons) is ignored.
    ///
    /// # Returns
    ///
    /// `true` if the event was routed to a channel.
    pub fn apply(&self, table: &InputStateTable, event: &RawEvent) -> bool {
        let code = match event.kind {
            EventKind::Key => RawCode::key(event.code),
            EventKind::Absolute => RawCode::absolute(event.code),
            EventKind::Other => return false,
        };

        let Some(channel) = self.route(code) else {
            return false;
        };

        trace!("{:?} <- {}", channel, event.value);
        match channel {
            Channel::Discrete(button) => table.update_button(button, event.value),
            Channel::Continuous(axis) => table.update_analog(axis, event.value),
            Channel::CrossAxis(axis) => apply_hat(table, axis, event.value),
        }
        true
    }
}

/// Converts a hat axis value into its d-pad button pair.
///
/// -1 presses the negative button (left/up), +1 the positive one
/// (right/down); anything else releases both.
pub fn apply_hat(table: &InputStateTable, axis: HatAxis, value: i32) {
    let (negative, positive) = axis.buttons();
    let (neg_value, pos_value) = match value {
        HAT_NEGATIVE => (1, 0),
        HAT_POSITIVE => (0, 1),
        _ => (0, 0),
    };
    table.update_button_pair((negative, neg_value), (positive, pos_value));
}

/// Rescales a raw value from `[min, max]` to 0-255, clamped.
///
/// An empty range (`min == max`) yields the midpoint instead of dividing by
/// zero.
///
/// # Examples
///
/// ```
/// use dualshock_bridge::controller::mapper::rescale;
///
/// assert_eq!(rescale(0, 0, 255), 0);
/// assert_eq!(rescale(255, 0, 255), 255);
/// assert_eq!(rescale(0, -32768, 32767), 127);
/// assert_eq!(rescale(40_000, -32768, 32767), 255);
/// assert_eq!(rescale(7, 10, 10), 128);
/// ```
#[must_use]
pub fn rescale(raw: i32, min: i32, max: i32) -> i32 {
    if min == max {
        return NORMALIZED_MIDPOINT;
    }

    let span = i64::from(max) - i64::from(min);
    let offset = i64::from(raw) - i64::from(min);
    let scaled = offset * i64::from(NORMALIZED_MAX) / span;

    scaled.clamp(i64::from(NORMALIZED_MIN), i64::from(NORMALIZED_MAX)) as i32
}

/// Collapses a normalized stick value to center when it lies strictly within
/// `deadzone` of 128.
///
/// # Examples
///
/// ```
/// use dualshock_bridge::controller::mapper::apply_deadzone;
///
/// assert_eq!(apply_deadzone(137, 10), 128);
/// assert_eq!(apply_deadzone(138, 10), 138);
/// ```
#[inline]
#[must_use]
pub fn apply_deadzone(value: i32, deadzone: i32) -> i32 {
    if (value - STICK_NEUTRAL).abs() < deadzone {
        STICK_NEUTRAL
    } else {
        value
    }
}

/// Turns raw snapshots into normalized ones for a given profile.
#[derive(Debug, Clone)]
pub struct Normalizer {
    profile: DeviceProfile,
    deadzone: i32,
}

impl Normalizer {
    /// Creates a normalizer.
    ///
    /// # Arguments
    ///
    /// * `profile` - Calibration source
    /// * `deadzone` - Stick deadzone in normalized units (values closer than
    ///   this to 128 become 128)
    #[must_use]
    pub fn new(profile: DeviceProfile, deadzone: i32) -> Self {
        Self { profile, deadzone }
    }

    #[must_use]
    pub fn deadzone(&self) -> i32 {
        self.deadzone
    }

    #[must_use]
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Normalizes a raw snapshot.
    ///
    /// Buttons are copied through. Each analog channel the profile calibrates
    /// is rescaled to 0-255; stick channels then get the deadzone, triggers do
    /// not. Channels the profile does not calibrate keep their value.
    #[must_use]
    pub fn normalize(&self, raw: &InputSnapshot) -> InputSnapshot {
        let mut normalized = *raw;

        for cal in self.profile.axes() {
            let value = rescale(raw.analog(cal.channel), cal.min, cal.max);
            let value = match cal.channel.family() {
                AnalogFamily::Stick => apply_deadzone(value, self.deadzone),
                AnalogFamily::Trigger => value,
            };
            normalized.set_analog(cal.channel, value);
        }

        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::channels::{Analog, Button};
    use crate::controller::profile::ProfileRegistry;

    fn ds4() -> DeviceProfile {
        ProfileRegistry::builtin()
            .unwrap()
            .get("DualShock4")
            .unwrap()
            .clone()
    }

    fn key(code: u16, value: i32) -> RawEvent {
        RawEvent::new(EventKind::Key, code, value)
    }

    fn abs(code: u16, value: i32) -> RawEvent {
        RawEvent::new(EventKind::Absolute, code, value)
    }

    fn with_analog(axis: Analog, value: i32) -> InputSnapshot {
        let mut snapshot = InputSnapshot::neutral();
        snapshot.set_analog(axis, value);
        snapshot
    }

    // ==================== Routing Tests ====================

    #[test]
    fn test_routing_table_includes_all_kinds() {
        let routing = RoutingTable::build(&ds4());

        assert_eq!(routing.route(RawCode::key(0x130)), Some(Channel::Discrete(Button::Cross)));
        assert_eq!(routing.route(RawCode::key(0x133)), Some(Channel::Discrete(Button::Triangle)));
        assert_eq!(routing.route(RawCode::absolute(0x00)), Some(Channel::Continuous(Analog::LeftX)));
        assert_eq!(routing.route(RawCode::absolute(0x01)), Some(Channel::Continuous(Analog::LeftY)));
        assert_eq!(routing.route(RawCode::absolute(0x02)), Some(Channel::Continuous(Analog::L2)));
        assert_eq!(routing.route(RawCode::absolute(0x05)), Some(Channel::Continuous(Analog::R2)));
        assert_eq!(routing.route(RawCode::absolute(0x10)), Some(Channel::CrossAxis(HatAxis::X)));
        assert_eq!(routing.route(RawCode::absolute(0x11)), Some(Channel::CrossAxis(HatAxis::Y)));
        // 12 buttons + 6 axes + 2 hat axes
        assert_eq!(routing.len(), 20);
    }

    #[test]
    fn test_key_and_absolute_namespaces_do_not_collide() {
        let routing = RoutingTable::build(&ds4());
        // EV_KEY code 0 is KEY_RESERVED, not the left stick
        assert_eq!(routing.route(RawCode::key(0x00)), None);
    }

    #[test]
    fn test_apply_button_and_axis_events() {
        let routing = RoutingTable::build(&ds4());
        let table = InputStateTable::new();

        assert!(routing.apply(&table, &key(0x130, 1)));
        assert!(routing.apply(&table, &abs(0x01, 12)));

        let snapshot = table.snapshot();
        assert_eq!(snapshot.button(Button::Cross), 1);
        assert_eq!(snapshot.analog(Analog::LeftY), 12);
    }

    #[test]
    fn test_apply_ignores_unmapped_and_other_events() {
        let routing = RoutingTable::build(&ds4());
        let table = InputStateTable::new();

        assert!(!routing.apply(&table, &abs(0x28, 99)));
        assert!(!routing.apply(&table, &key(0x2ff, 1)));
        assert!(!routing.apply(&table, &RawEvent::new(EventKind::Other, 0x00, 0)));
        assert_eq!(table.snapshot(), InputSnapshot::neutral());
    }

    #[test]
    fn test_hat_x_decoding() {
        let routing = RoutingTable::build(&ds4());
        let table = InputStateTable::new();

        routing.apply(&table, &abs(0x10, HAT_NEGATIVE));
        let s = table.snapshot();
        assert_eq!((s.button(Button::DpadLeft), s.button(Button::DpadRight)), (1, 0));

        routing.apply(&table, &abs(0x10, HAT_POSITIVE));
        let s = table.snapshot();
        assert_eq!((s.button(Button::DpadLeft), s.button(Button::DpadRight)), (0, 1));

        routing.apply(&table, &abs(0x10, HAT_RELEASED));
        let s = table.snapshot();
        assert_eq!((s.button(Button::DpadLeft), s.button(Button::DpadRight)), (0, 0));
    }

    #[test]
    fn test_hat_y_decoding_leaves_x_alone() {
        let table = InputStateTable::new();
        apply_hat(&table, HatAxis::X, HAT_POSITIVE);
        apply_hat(&table, HatAxis::Y, HAT_NEGATIVE);

        let s = table.snapshot();
        assert!(s.pressed(Button::DpadUp));
        assert!(!s.pressed(Button::DpadDown));
        assert!(s.pressed(Button::DpadRight));
    }

    #[test]
    fn test_button_dpad_profile_has_no_hat_routes() {
        let profile = DeviceProfile::from_toml_str(
            r#"
profile_name = "Arcade"
devices = [{ vendor_id = 1, product_id = 1 }]
[buttons]
dpad_up = "BTN_DPAD_UP"
dpad_down = "BTN_DPAD_DOWN"
[dpad]
type = "buttons"
"#,
        )
        .unwrap();
        let routing = RoutingTable::build(&profile);
        let table = InputStateTable::new();

        assert_eq!(routing.len(), 2);
        assert!(routing.apply(&table, &key(0x220, 1)));
        assert!(table.snapshot().pressed(Button::DpadUp));
    }

    // ==================== Rescale Tests ====================

    #[test]
    fn test_rescale_endpoints() {
        assert_eq!(rescale(0, 0, 255), NORMALIZED_MIN);
        assert_eq!(rescale(255, 0, 255), NORMALIZED_MAX);
        assert_eq!(rescale(-32768, -32768, 32767), NORMALIZED_MIN);
        assert_eq!(rescale(32767, -32768, 32767), NORMALIZED_MAX);
    }

    #[test]
    fn test_rescale_stays_in_range_over_declared_range() {
        for (min, max) in [(0, 255), (-32768, 32767), (0, 1023), (-1, 1)] {
            let step = ((max - min) / 97).max(1);
            let mut raw = min;
            while raw <= max {
                let value = rescale(raw, min, max);
                assert!((NORMALIZED_MIN..=NORMALIZED_MAX).contains(&value), "{} in [{}, {}]", raw, min, max);
                raw += step;
            }
        }
    }

    #[test]
    fn test_rescale_clamps_outside_range() {
        assert_eq!(rescale(-10, 0, 255), NORMALIZED_MIN);
        assert_eq!(rescale(300, 0, 255), NORMALIZED_MAX);
    }

    #[test]
    fn test_rescale_empty_range_returns_midpoint() {
        assert_eq!(rescale(0, 50, 50), NORMALIZED_MIDPOINT);
        assert_eq!(rescale(1000, 50, 50), NORMALIZED_MIDPOINT);
    }

    #[test]
    fn test_rescale_truncates() {
        // 100 * 255 / 1023 = 24.93
        assert_eq!(rescale(100, 0, 1023), 24);
    }

    // ==================== Deadzone Tests ====================

    #[test]
    fn test_deadzone_bounds_are_exclusive() {
        assert_eq!(apply_deadzone(128, 10), 128);
        assert_eq!(apply_deadzone(119, 10), 128);
        assert_eq!(apply_deadzone(137, 10), 128);
        assert_eq!(apply_deadzone(118, 10), 118);
        assert_eq!(apply_deadzone(138, 10), 138);
    }

    #[test]
    fn test_zero_deadzone_passes_everything() {
        assert_eq!(apply_deadzone(129, 0), 129);
        assert_eq!(apply_deadzone(127, 0), 127);
    }

    // ==================== Normalize Tests ====================

    #[test]
    fn test_normalize_stick_min_max() {
        let normalizer = Normalizer::new(ds4(), 10);
        assert_eq!(normalizer.normalize(&with_analog(Analog::LeftX, 0)).analog(Analog::LeftX), 0);
        assert_eq!(normalizer.normalize(&with_analog(Analog::LeftX, 255)).analog(Analog::LeftX), 255);
    }

    #[test]
    fn test_normalize_stick_near_center() {
        let normalizer = Normalizer::new(ds4(), 10);
        assert_eq!(normalizer.normalize(&with_analog(Analog::LeftX, 133)).analog(Analog::LeftX), 128);
        assert_eq!(normalizer.normalize(&with_analog(Analog::LeftX, 123)).analog(Analog::LeftX), 128);
        assert_eq!(normalizer.normalize(&with_analog(Analog::LeftX, 143)).analog(Analog::LeftX), 143);
    }

    #[test]
    fn test_normalize_trigger_has_no_deadzone() {
        let normalizer = Normalizer::new(ds4(), 10);
        // 133 on a trigger stays 133 even though it is within 10 of 128
        assert_eq!(normalizer.normalize(&with_analog(Analog::L2, 133)).analog(Analog::L2), 133);
        assert_eq!(normalizer.normalize(&with_analog(Analog::L2, 0)).analog(Analog::L2), 0);
        assert_eq!(normalizer.normalize(&with_analog(Analog::R2, 255)).analog(Analog::R2), 255);
    }

    #[test]
    fn test_normalize_copies_buttons() {
        let normalizer = Normalizer::new(ds4(), 10);
        let mut raw = InputSnapshot::neutral();
        raw.set_button(Button::Circle, 1);
        raw.set_button(Button::Touchpad, 1);

        let normalized = normalizer.normalize(&raw);
        assert_eq!(normalized.button(Button::Circle), 1);
        assert_eq!(normalized.button(Button::Touchpad), 1);
        assert_eq!(normalized.button(Button::Cross), 0);
    }

    #[test]
    fn test_normalize_wide_range_device() {
        let profile = DeviceProfile::from_toml_str(
            r#"
profile_name = "Wide"
devices = [{ vendor_id = 1, product_id = 1 }]
sticks.right_x = { code = "ABS_RX", min = -32768, max = 32767 }
[dpad]
type = "buttons"
"#,
        )
        .unwrap();
        let normalizer = Normalizer::new(profile, 10);

        assert_eq!(normalizer.normalize(&with_analog(Analog::RightX, 0)).analog(Analog::RightX), 128);
        assert_eq!(normalizer.normalize(&with_analog(Analog::RightX, 32767)).analog(Analog::RightX), 255);
        // Uncalibrated channel keeps its value
        assert_eq!(normalizer.normalize(&with_analog(Analog::L2, 40)).analog(Analog::L2), 40);
    }

    #[test]
    fn test_normalize_neutral_is_neutral() {
        let normalizer = Normalizer::new(ds4(), 10);
        assert_eq!(normalizer.normalize(&InputSnapshot::neutral()), InputSnapshot::neutral());
    }
}
