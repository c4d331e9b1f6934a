//! # Canonical Channel Set
//!
//! The fixed set of controller channels every snapshot carries, independent
//! of which controller family is attached.
//!
//! | Kind | Channels | Neutral |
//! |------|----------|---------|
//! | Discrete | triangle, circle, cross, square, L1, R1, L3, R3, dpad_up/down/left/right, select, start, ps, touchpad | 0 |
//! | Stick | left_x, left_y, right_x, right_y | 128 |
//! | Trigger | L2, R2 | 0 |

use serde::Deserialize;
use std::fmt;

/// Neutral value of a discrete (button) channel.
pub const BUTTON_NEUTRAL: i32 = 0;

/// Neutral value of a stick axis (also the normalized center).
pub const STICK_NEUTRAL: i32 = 128;

/// Neutral value of a trigger axis.
pub const TRIGGER_NEUTRAL: i32 = 0;

/// Discrete (button) channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Button {
    #[serde(rename = "triangle")]
    Triangle,
    #[serde(rename = "circle")]
    Circle,
    #[serde(rename = "cross")]
    Cross,
    #[serde(rename = "square")]
    Square,
    L1,
    R1,
    L3,
    R3,
    #[serde(rename = "dpad_up")]
    DpadUp,
    #[serde(rename = "dpad_down")]
    DpadDown,
    #[serde(rename = "dpad_left")]
    DpadLeft,
    #[serde(rename = "dpad_right")]
    DpadRight,
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "ps")]
    Ps,
    #[serde(rename = "touchpad")]
    Touchpad,
}

impl Button {
    /// Number of discrete channels.
    pub const COUNT: usize = 16;

    /// All discrete channels in canonical order.
    pub const ALL: [Button; Button::COUNT] = [
        Button::Triangle,
        Button::Circle,
        Button::Cross,
        Button::Square,
        Button::L1,
        Button::R1,
        Button::L3,
        Button::R3,
        Button::DpadUp,
        Button::DpadDown,
        Button::DpadLeft,
        Button::DpadRight,
        Button::Select,
        Button::Start,
        Button::Ps,
        Button::Touchpad,
    ];

    /// Position of this channel in [`Button::ALL`].
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical channel name, as used in profiles, config and JSON output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Button::Triangle => "triangle",
            Button::Circle => "circle",
            Button::Cross => "cross",
            Button::Square => "square",
            Button::L1 => "L1",
            Button::R1 => "R1",
            Button::L3 => "L3",
            Button::R3 => "R3",
            Button::DpadUp => "dpad_up",
            Button::DpadDown => "dpad_down",
            Button::DpadLeft => "dpad_left",
            Button::DpadRight => "dpad_right",
            Button::Select => "select",
            Button::Start => "start",
            Button::Ps => "ps",
            Button::Touchpad => "touchpad",
        }
    }

    /// Looks up a discrete channel by its canonical name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Button::ALL.into_iter().find(|b| b.as_str() == name)
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuous (analog) channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Analog {
    LeftX,
    LeftY,
    RightX,
    RightY,
    L2,
    R2,
}

/// Analog channel family; decides neutral value and deadzone handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogFamily {
    /// Self-centering stick axis (neutral 128, deadzone applies).
    Stick,
    /// Trigger axis (neutral 0, no deadzone).
    Trigger,
}

impl Analog {
    /// Number of analog channels.
    pub const COUNT: usize = 6;

    /// All analog channels in canonical order.
    pub const ALL: [Analog; Analog::COUNT] = [
        Analog::LeftX,
        Analog::LeftY,
        Analog::RightX,
        Analog::RightY,
        Analog::L2,
        Analog::R2,
    ];

    /// Position of this channel in [`Analog::ALL`].
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical channel name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Analog::LeftX => "left_x",
            Analog::LeftY => "left_y",
            Analog::RightX => "right_x",
            Analog::RightY => "right_y",
            Analog::L2 => "L2",
            Analog::R2 => "R2",
        }
    }

    /// Looks up an analog channel by its canonical name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Analog::ALL.into_iter().find(|a| a.as_str() == name)
    }

    #[must_use]
    pub fn family(self) -> AnalogFamily {
        match self {
            Analog::LeftX | Analog::LeftY | Analog::RightX | Analog::RightY => AnalogFamily::Stick,
            Analog::L2 | Analog::R2 => AnalogFamily::Trigger,
        }
    }

    /// Value this channel holds when the controller is untouched.
    #[must_use]
    pub fn neutral(self) -> i32 {
        match self.family() {
            AnalogFamily::Stick => STICK_NEUTRAL,
            AnalogFamily::Trigger => TRIGGER_NEUTRAL,
        }
    }
}

impl fmt::Display for Analog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// D-pad axis carried by a hat-style cross key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HatAxis {
    /// -1 = left, +1 = right
    X,
    /// -1 = up, +1 = down
    Y,
}

impl HatAxis {
    /// Button pair `(negative, positive)` this axis drives.
    #[must_use]
    pub fn buttons(self) -> (Button, Button) {
        match self {
            HatAxis::X => (Button::DpadLeft, Button::DpadRight),
            HatAxis::Y => (Button::DpadUp, Button::DpadDown),
        }
    }
}

/// Where a raw input code is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Discrete(Button),
    Continuous(Analog),
    CrossAxis(HatAxis),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_indices_match_canonical_order() {
        for (i, button) in Button::ALL.iter().enumerate() {
            assert_eq!(button.index(), i);
        }
        for (i, axis) in Analog::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
        }
    }

    #[test]
    fn test_names_round_trip() {
        for button in Button::ALL {
            assert_eq!(Button::from_name(button.as_str()), Some(button));
        }
        for axis in Analog::ALL {
            assert_eq!(Analog::from_name(axis.as_str()), Some(axis));
        }
        assert_eq!(Button::from_name("l1"), None);
        assert_eq!(Analog::from_name("throttle"), None);
    }

    #[test]
    fn test_neutral_values() {
        assert_eq!(Analog::LeftX.neutral(), 128);
        assert_eq!(Analog::RightY.neutral(), 128);
        assert_eq!(Analog::L2.neutral(), 0);
        assert_eq!(Analog::R2.neutral(), 0);
    }

    #[test]
    fn test_serde_names_match_as_str() {
        #[derive(Deserialize)]
        struct Holder {
            button: Button,
        }

        for button in Button::ALL {
            let holder: Holder = toml::from_str(&format!("button = \"{}\"", button)).unwrap();
            assert_eq!(holder.button, button);
        }
    }

    #[test]
    fn test_hat_axis_buttons() {
        assert_eq!(HatAxis::X.buttons(), (Button::DpadLeft, Button::DpadRight));
        assert_eq!(HatAxis::Y.buttons(), (Button::DpadUp, Button::DpadDown));
    }
}
