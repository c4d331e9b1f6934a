//! Per-tick helpers owned by the bridge driver: button edge detection and
//! transmit-rate gating.

use tokio::time::{Duration, Instant};

use crate::controller::channels::Button;
use crate::controller::input_state::InputSnapshot;

/// Previous-tick button cache for rising-edge detection.
///
/// The first snapshot only primes the cache, so a button already held when
/// the session starts is not reported as a rising edge.
#[derive(Debug, Clone, Default)]
pub struct EdgeTracker {
    previous: Option<[bool; Button::COUNT]>,
    current: [bool; Button::COUNT],
}

impl EdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records this tick's button states.
    pub fn update(&mut self, snapshot: &InputSnapshot) {
        let mut pressed = [false; Button::COUNT];
        for (button, value) in snapshot.buttons() {
            pressed[button.index()] = value != 0;
        }

        self.previous = Some(match self.previous {
            Some(_) => self.current,
            None => pressed,
        });
        self.current = pressed;
    }

    /// True if `button` went from released to pressed on the last update.
    pub fn rising(&self, button: Button) -> bool {
        match self.previous {
            Some(previous) => self.current[button.index()] && !previous[button.index()],
            None => false,
        }
    }
}

/// Drops ticks until the transmit interval has elapsed.
///
/// Deadlines advance by whole periods so that tick jitter does not slow the
/// effective rate; after a long stall the schedule restarts from `now`.
#[derive(Debug, Clone)]
pub struct TransmitGate {
    period: Duration,
    next_due: Option<Instant>,
}

impl TransmitGate {
    /// Gate for `rate_hz` transmissions per second. A rate of 0 is treated as 1.
    pub fn new(rate_hz: u32) -> Self {
        Self {
            period: Duration::from_secs(1) / rate_hz.max(1),
            next_due: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a frame should go out at `now`. The first call always opens.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now < due => false,
            Some(due) => {
                let next = due + self.period;
                self.next_due = Some(if next <= now { now + self.period } else { next });
                true
            }
            None => {
                self.next_due = Some(now + self.period);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(buttons: &[Button]) -> InputSnapshot {
        let mut snapshot = InputSnapshot::neutral();
        for &b in buttons {
            snapshot.set_button(b, 1);
        }
        snapshot
    }

    #[test]
    fn test_rising_edge_only_on_press() {
        let mut edges = EdgeTracker::new();
        edges.update(&pressed(&[]));
        assert!(!edges.rising(Button::R3));

        edges.update(&pressed(&[Button::R3]));
        assert!(edges.rising(Button::R3));

        // Held
        edges.update(&pressed(&[Button::R3]));
        assert!(!edges.rising(Button::R3));

        // Released
        edges.update(&pressed(&[]));
        assert!(!edges.rising(Button::R3));

        edges.update(&pressed(&[Button::R3]));
        assert!(edges.rising(Button::R3));
    }

    #[test]
    fn test_button_held_at_start_is_not_an_edge() {
        let mut edges = EdgeTracker::new();
        assert!(!edges.rising(Button::Start));

        edges.update(&pressed(&[Button::Start]));
        assert!(!edges.rising(Button::Start));

        edges.update(&pressed(&[Button::Start]));
        assert!(!edges.rising(Button::Start));
    }

    #[test]
    fn test_edges_are_per_button() {
        let mut edges = EdgeTracker::new();
        edges.update(&pressed(&[Button::L3]));
        edges.update(&pressed(&[Button::L3, Button::R3]));
        assert!(edges.rising(Button::R3));
        assert!(!edges.rising(Button::L3));
    }

    #[test]
    fn test_gate_first_tick_opens() {
        let mut gate = TransmitGate::new(5);
        assert_eq!(gate.period(), Duration::from_millis(200));
        assert!(gate.ready(Instant::now()));
    }

    #[test]
    fn test_gate_drops_early_ticks() {
        let mut gate = TransmitGate::new(5);
        let t0 = Instant::now();
        let tick = Duration::from_millis(20);

        let opened: Vec<bool> = (0..21).map(|i| gate.ready(t0 + tick * i)).collect();

        // 50 Hz ticks through a 5 Hz gate: open at 0, 200, 400 ms
        let expected: Vec<usize> = vec![0, 10, 20];
        let actual: Vec<usize> = opened
            .iter()
            .enumerate()
            .filter_map(|(i, &o)| o.then_some(i))
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_gate_jitter_does_not_drift() {
        let mut gate = TransmitGate::new(5);
        let t0 = Instant::now();
        assert!(gate.ready(t0));
        // Slightly late tick still opens and the next deadline stays on schedule.
        assert!(gate.ready(t0 + Duration::from_millis(205)));
        assert!(!gate.ready(t0 + Duration::from_millis(395)));
        assert!(gate.ready(t0 + Duration::from_millis(400)));
    }

    #[test]
    fn test_gate_restarts_after_stall() {
        let mut gate = TransmitGate::new(10);
        let t0 = Instant::now();
        assert!(gate.ready(t0));
        assert!(gate.ready(t0 + Duration::from_secs(5)));
        // Does not burst to catch up
        assert!(!gate.ready(t0 + Duration::from_millis(5050)));
        assert!(gate.ready(t0 + Duration::from_millis(5100)));
    }

    #[test]
    fn test_gate_at_snapshot_rate_passes_every_tick() {
        let mut gate = TransmitGate::new(50);
        let t0 = Instant::now();
        for i in 0..10 {
            assert!(gate.ready(t0 + Duration::from_millis(20) * i));
        }
    }

    #[test]
    fn test_gate_zero_rate_treated_as_one() {
        assert_eq!(TransmitGate::new(0).period(), Duration::from_secs(1));
    }
}
