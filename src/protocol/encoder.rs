//! # Frame Encoder
//!
//! Turns normalized snapshots into command frames.
//!
//! The encoder owns the state that outlives a single frame: the safety stop
//! flag, the rolling timestamp, the wheel-speed level and the hand-forward
//! latch. Each session gets its own encoder.

use tracing::debug;

use super::frame::{
    build_discrete, build_header, build_options, duty_to_signed_byte, stick_to_duty, FireMode,
    Frame, LiftMode, SecondaryAction, SpeedMode, FRAME_TYPE_COMMAND, TIMESTAMP_MODULO,
    WHEEL_SPEED_MAX,
};
use crate::controller::channels::{Analog, Button};
use crate::controller::input_state::InputSnapshot;

/// Stateful command frame encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEncoder {
    safety_stop: bool,
    timestamp: u8,
    wheel_speed: u8,
    hand_forward: bool,
}

impl FrameEncoder {
    /// Creates an encoder. The first frame carries timestamp 1.
    #[must_use]
    pub fn new(start_in_safety_stop: bool) -> Self {
        Self {
            safety_stop: start_in_safety_stop,
            timestamp: 0,
            wheel_speed: 0,
            hand_forward: false,
        }
    }

    /// Encodes one normalized snapshot.
    ///
    /// Advances the timestamp on every call, updates the hand latch, and
    /// applies the safety override last.
    pub fn encode(&mut self, snapshot: &InputSnapshot) -> Frame {
        self.timestamp = (self.timestamp + 1) % TIMESTAMP_MODULO;
        let header = build_header(self.safety_stop, FRAME_TYPE_COMMAND, self.timestamp);

        let velocity_x = duty_to_signed_byte(-stick_to_duty(snapshot.analog(Analog::LeftY)));
        let velocity_y = duty_to_signed_byte(-stick_to_duty(snapshot.analog(Analog::LeftX)));
        let velocity_yaw = duty_to_signed_byte(stick_to_duty(snapshot.analog(Analog::RightX)));

        let fire = if snapshot.pressed(Button::Circle) {
            FireMode::Rapid
        } else if snapshot.pressed(Button::Cross) {
            FireMode::Single
        } else {
            FireMode::Off
        };
        let fire_angle = u8::from(snapshot.pressed(Button::Triangle));

        let mut lift = if snapshot.pressed(Button::DpadUp) {
            LiftMode::Raise
        } else if snapshot.pressed(Button::DpadDown) {
            LiftMode::Lower
        } else {
            LiftMode::Hold
        };

        if snapshot.pressed(Button::Square) {
            self.hand_forward = true;
        } else if snapshot.pressed(Button::R1) {
            self.hand_forward = false;
        }

        let secondary = if snapshot.pressed(Button::DpadRight) {
            SecondaryAction::Advance
        } else if snapshot.pressed(Button::DpadLeft) {
            SecondaryAction::Retreat
        } else {
            SecondaryAction::Hold
        };

        let speed_mode = if snapshot.pressed(Button::L1) {
            SpeedMode::Reduced
        } else {
            SpeedMode::Fast
        };

        // Safety override is the last mutation before packing.
        if self.safety_stop {
            self.wheel_speed = 0;
            self.hand_forward = false;
            lift = LiftMode::Hold;
        }

        let discrete = build_discrete(
            self.wheel_speed,
            fire as u8,
            lift as u8,
            u8::from(self.hand_forward),
            fire_angle,
        );
        let options = build_options(speed_mode as u8, secondary as u8);

        let frame = Frame::with_checksum([header, velocity_x, velocity_y, velocity_yaw, discrete, options]);
        debug!("Encoded frame: {}", frame);
        frame
    }

    /// Engages or releases the safety stop.
    pub fn set_safety_stop(&mut self, engaged: bool) {
        if self.safety_stop != engaged {
            debug!("Safety stop {}", if engaged { "engaged" } else { "released" });
        }
        self.safety_stop = engaged;
    }

    /// Raises the wheel-speed level by one, saturating at 3.
    pub fn increase(&mut self) {
        if self.wheel_speed < WHEEL_SPEED_MAX {
            self.wheel_speed += 1;
        }
    }

    /// Lowers the wheel-speed level by one, saturating at 0.
    pub fn decrease(&mut self) {
        self.wheel_speed = self.wheel_speed.saturating_sub(1);
    }

    #[must_use]
    pub fn safety_stop(&self) -> bool {
        self.safety_stop
    }

    #[must_use]
    pub fn timestamp(&self) -> u8 {
        self.timestamp
    }

    #[must_use]
    pub fn wheel_speed(&self) -> u8 {
        self.wheel_speed
    }

    #[must_use]
    pub fn hand_forward(&self) -> bool {
        self.hand_forward
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(true)
    }
}
