//! # Session Drivers
//!
//! Consumers of the snapshot stream, one per output mode:
//!
//! | Mode | Driver | Output |
//! |------|--------|--------|
//! | json | [`run_json`] | one JSON object per snapshot tick |
//! | bridge | [`run_bridge`] + [`SerialLink`](crate::serial::SerialLink) | frames on the serial port |
//! | debug | [`run_bridge`] + [`DebugSink`] | decoded frames on stdout |

use std::io::{self, Write};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::edges::{EdgeTracker, TransmitGate};
use super::reader::SnapshotStream;
use crate::controller::channels::Button;
use crate::controller::input_state::InputSnapshot;
use crate::error::{BridgeError, Result};
use crate::protocol::{Frame, FrameEncoder};
use crate::serial::FrameSink;

/// Frames between status log lines
const LOG_INTERVAL_FRAMES: u64 = 100;

/// Buttons the loop watches for edge-triggered actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopBindings {
    #[serde(default = "default_safety_stop")]
    pub safety_stop: Button,

    #[serde(default = "default_safety_resume")]
    pub safety_resume: Button,

    #[serde(default = "default_wheel_up")]
    pub wheel_up: Button,

    #[serde(default = "default_wheel_down")]
    pub wheel_down: Button,
}

fn default_safety_stop() -> Button {
    Button::Ps
}

fn default_safety_resume() -> Button {
    Button::Start
}

fn default_wheel_up() -> Button {
    Button::R3
}

fn default_wheel_down() -> Button {
    Button::L3
}

impl Default for LoopBindings {
    fn default() -> Self {
        Self {
            safety_stop: default_safety_stop(),
            safety_resume: default_safety_resume(),
            wheel_up: default_wheel_up(),
            wheel_down: default_wheel_down(),
        }
    }
}

impl LoopBindings {
    /// Applies this tick's rising edges to the encoder.
    ///
    /// Resume is handled before stop, so stop wins when both rise together.
    pub fn apply(&self, edges: &EdgeTracker, encoder: &mut FrameEncoder) {
        if edges.rising(self.safety_resume) {
            info!("Safety stop released ({})", self.safety_resume);
            encoder.set_safety_stop(false);
        }
        if edges.rising(self.safety_stop) {
            info!("Safety stop engaged ({})", self.safety_stop);
            encoder.set_safety_stop(true);
        }
        if edges.rising(self.wheel_up) {
            encoder.increase();
            debug!("Wheel speed {}", encoder.wheel_speed());
        }
        if edges.rising(self.wheel_down) {
            encoder.decrease();
            debug!("Wheel speed {}", encoder.wheel_speed());
        }
    }
}

/// Bridge-mode parameters.
#[derive(Debug, Clone, Copy)]
pub struct BridgeSettings {
    pub rate_hz: u32,
    pub start_in_safety_stop: bool,
    pub bindings: LoopBindings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            rate_hz: 5,
            start_in_safety_stop: true,
            bindings: LoopBindings::default(),
        }
    }
}

/// Counters reported when a bridge session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub ticks: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
}

/// Drives a bridge session until the stream ends.
///
/// Every snapshot tick updates edges and applies the loop bindings; frames
/// are encoded only when the transmit gate opens. Send failures are logged
/// and the loop keeps going. On exit the stream is stopped and a final
/// neutral frame with the safety stop engaged is sent.
pub async fn run_bridge(
    stream: &mut SnapshotStream,
    sink: &mut dyn FrameSink,
    settings: BridgeSettings,
) -> BridgeStats {
    let mut encoder = FrameEncoder::new(settings.start_in_safety_stop);
    let mut edges = EdgeTracker::new();
    let mut gate = TransmitGate::new(settings.rate_hz);
    let mut stats = BridgeStats::default();

    info!(
        "Bridge running at {} Hz (safety stop {})",
        settings.rate_hz,
        if settings.start_in_safety_stop { "engaged" } else { "released" }
    );

    while let Some(snapshot) = stream.next().await {
        stats.ticks += 1;
        edges.update(&snapshot);
        settings.bindings.apply(&edges, &mut encoder);

        if !gate.ready(Instant::now()) {
            continue;
        }

        let frame = encoder.encode(&snapshot);
        match sink.send(&frame).await {
            Ok(()) => {
                stats.frames_sent += 1;
                if stats.frames_sent % LOG_INTERVAL_FRAMES == 0 {
                    info!("Sent {} frames", stats.frames_sent);
                }
            }
            Err(e) => {
                stats.send_failures += 1;
                warn!("Failed to send frame: {}", e);
            }
        }
    }

    stream.stop().await;

    encoder.set_safety_stop(true);
    let last = encoder.encode(&InputSnapshot::neutral());
    match sink.send(&last).await {
        Ok(()) => stats.frames_sent += 1,
        Err(e) => {
            stats.send_failures += 1;
            warn!("Failed to send final safety frame: {}", e);
        }
    }

    info!(
        "Bridge stopped: {} ticks, {} frames sent, {} failures",
        stats.ticks, stats.frames_sent, stats.send_failures
    );
    stats
}

/// Writes one JSON status line per snapshot tick until the stream ends.
///
/// Returns the number of lines written.
///
/// # Errors
///
/// `Json` or `Io` if a line cannot be written; the stream is stopped first.
pub async fn run_json<W: Write>(stream: &mut SnapshotStream, writer: &mut W) -> Result<u64> {
    let mut lines = 0;
    let outcome = loop {
        let Some(snapshot) = stream.next().await else {
            break Ok(());
        };
        if let Err(e) = write_status_line(writer, &snapshot) {
            break Err(e);
        }
        lines += 1;
    };

    stream.stop().await;
    outcome.map(|()| lines)
}

fn write_status_line<W: Write>(writer: &mut W, snapshot: &InputSnapshot) -> Result<()> {
    serde_json::to_writer(&mut *writer, snapshot)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Sink that prints each frame and its decoded fields instead of sending it.
pub struct DebugSink<W: Write + Send> {
    writer: W,
}

impl DebugSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> DebugSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> FrameSink for DebugSink<W> {
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        writeln!(self.writer, "{}  {}", frame, frame.fields())
            .and_then(|()| self.writer.flush())
            .map_err(BridgeError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::reader::ControllerReader;
    use crate::controller::device::mocks::ScriptedSource;
    use crate::controller::device::{EventKind, RawEvent, ReadOutcome};
    use crate::controller::profile::{DeviceProfile, ProfileRegistry};
    use crate::serial::port_trait::mocks::MockSerialPort;
    use crate::serial::SerialLink;
    use std::sync::{Arc, Mutex};
    use tokio::time::{sleep, Duration};

    fn ds4() -> DeviceProfile {
        ProfileRegistry::builtin()
            .unwrap()
            .get("DualShock4")
            .unwrap()
            .clone()
    }

    fn key(code: u16, value: i32) -> ReadOutcome {
        ReadOutcome::Event(RawEvent::new(EventKind::Key, code, value))
    }

    fn idle(n: usize) -> impl Iterator<Item = ReadOutcome> {
        std::iter::repeat(ReadOutcome::Idle).take(n)
    }

    fn start(script: Vec<ReadOutcome>) -> SnapshotStream {
        ControllerReader::new(Box::new(ScriptedSource::new(script)), ds4(), 10).start()
    }

    fn stop_after(stream: &SnapshotStream, after: Duration) {
        let handle = stream.stop_handle();
        tokio::spawn(async move {
            sleep(after).await;
            handle.stop();
        });
    }

    /// Collects frames in memory.
    #[derive(Clone, Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<Frame>>>,
        fail: bool,
    }

    #[async_trait]
    impl FrameSink for RecordingSink {
        async fn send(&mut self, frame: &Frame) -> Result<()> {
            if self.fail {
                return Err(BridgeError::Serial("unplugged".to_string()));
            }
            self.frames.lock().unwrap().push(*frame);
            Ok(())
        }
    }

    // ==================== Binding Tests ====================

    #[test]
    fn test_default_bindings() {
        let bindings = LoopBindings::default();
        assert_eq!(bindings.safety_stop, Button::Ps);
        assert_eq!(bindings.safety_resume, Button::Start);
        assert_eq!(bindings.wheel_up, Button::R3);
        assert_eq!(bindings.wheel_down, Button::L3);
    }

    #[test]
    fn test_bindings_apply_edges() {
        let bindings = LoopBindings::default();
        let mut encoder = FrameEncoder::new(true);
        let mut edges = EdgeTracker::new();
        let mut snapshot = InputSnapshot::neutral();

        edges.update(&snapshot);
        snapshot.set_button(Button::Start, 1);
        snapshot.set_button(Button::R3, 1);
        edges.update(&snapshot);
        bindings.apply(&edges, &mut encoder);
        assert!(!encoder.safety_stop());
        assert_eq!(encoder.wheel_speed(), 1);

        // Held buttons do not repeat
        edges.update(&snapshot);
        bindings.apply(&edges, &mut encoder);
        assert_eq!(encoder.wheel_speed(), 1);

        snapshot.set_button(Button::R3, 0);
        snapshot.set_button(Button::L3, 1);
        edges.update(&snapshot);
        bindings.apply(&edges, &mut encoder);
        assert_eq!(encoder.wheel_speed(), 0);
    }

    #[test]
    fn test_stop_wins_over_resume() {
        let bindings = LoopBindings::default();
        let mut encoder = FrameEncoder::new(false);
        let mut edges = EdgeTracker::new();
        let mut snapshot = InputSnapshot::neutral();

        edges.update(&snapshot);
        snapshot.set_button(Button::Start, 1);
        snapshot.set_button(Button::Ps, 1);
        edges.update(&snapshot);
        bindings.apply(&edges, &mut encoder);
        assert!(encoder.safety_stop());
    }

    #[test]
    fn test_bindings_from_toml() {
        let bindings: LoopBindings = toml::from_str("safety_stop = \"select\"\nwheel_up = \"R1\"").unwrap();
        assert_eq!(bindings.safety_stop, Button::Select);
        assert_eq!(bindings.safety_resume, Button::Start);
        assert_eq!(bindings.wheel_up, Button::R1);

        assert!(toml::from_str::<LoopBindings>("safety_stop = \"home\"").is_err());
    }

    // ==================== Debug Sink Tests ====================

    #[tokio::test]
    async fn test_debug_sink_prints_decoded_frame() {
        let mut sink = DebugSink::new(Vec::new());
        let frame = FrameEncoder::new(true).encode(&InputSnapshot::neutral());
        sink.send(&frame).await.unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("24,00,00,00,00,00,a5  ts=1 stop=Y"));
        assert!(text.ends_with("crc=OK\n"));
    }

    // ==================== JSON Driver Tests ====================

    #[tokio::test]
    async fn test_run_json_emits_one_line_per_tick() {
        let mut stream = start(vec![key(0x130, 1)]);
        stop_after(&stream, Duration::from_millis(120));

        let mut out = Vec::new();
        let lines = run_json(&mut stream, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(lines >= 2);
        assert_eq!(text.lines().count() as u64, lines);
        assert!(text.ends_with('\n'));

        for line in text.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["buttons"].as_object().unwrap().len(), Button::COUNT);
            assert_eq!(value["analog"]["left_x"], 128);
        }
        assert!(stream.is_stopped());
    }

    #[tokio::test]
    async fn test_run_json_stops_on_write_error() {
        struct BrokenPipe;
        impl Write for BrokenPipe {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let source = ScriptedSource::new([]);
        let closed = source.closed_flag();
        let mut stream = ControllerReader::new(Box::new(source), ds4(), 10).start();

        let result = run_json(&mut stream, &mut BrokenPipe).await;

        assert!(result.is_err());
        assert!(stream.is_stopped());
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    // ==================== Bridge Driver Tests ====================

    #[tokio::test]
    async fn test_run_bridge_respects_rate_and_sends_final_safety_frame() {
        let mut stream = start(vec![]);
        stop_after(&stream, Duration::from_millis(450));

        let mut sink = RecordingSink::default();
        let settings = BridgeSettings {
            rate_hz: 5,
            ..BridgeSettings::default()
        };
        let stats = run_bridge(&mut stream, &mut sink, settings).await;

        let frames = sink.frames.lock().unwrap().clone();
        assert_eq!(frames.len() as u64, stats.frames_sent);
        assert!(stats.ticks > stats.frames_sent);
        // 0, 200, 400 ms plus the final frame; allow one tick of slack
        assert!((3..=5).contains(&frames.len()), "sent {} frames", frames.len());

        for (i, frame) in frames.iter().enumerate() {
            assert!(frame.checksum_ok());
            assert_eq!(frame.fields().timestamp as usize, (i + 1) % 8);
        }

        let last = frames.last().unwrap().fields();
        assert!(!last.safety_ok);
        assert_eq!((last.velocity_x, last.velocity_y, last.velocity_yaw), (0, 0, 0));
        assert_eq!(last.fire, 0);
    }

    #[tokio::test]
    async fn test_run_bridge_resume_and_wheel_edges() {
        // start (0x13b), later R3 (0x13e) pressed and released
        let mut script = vec![];
        script.extend(idle(40));
        script.push(key(0x13b, 1));
        script.extend(idle(40));
        script.push(key(0x13e, 1));
        script.extend(idle(40));
        script.push(key(0x13e, 0));
        let mut stream = start(script);
        stop_after(&stream, Duration::from_millis(500));

        let mut sink = RecordingSink::default();
        let settings = BridgeSettings {
            rate_hz: 50,
            start_in_safety_stop: true,
            bindings: LoopBindings::default(),
        };
        let stats = run_bridge(&mut stream, &mut sink, settings).await;
        assert_eq!(stats.send_failures, 0);

        let frames = sink.frames.lock().unwrap().clone();
        let fields: Vec<_> = frames.iter().map(Frame::fields).collect();

        assert!(!fields[0].safety_ok);
        let released = fields.iter().position(|f| f.safety_ok).expect("never resumed");
        assert!(fields[released..].iter().any(|f| f.safety_ok && f.wheel_speed == 1));
        // Held R3 does not keep climbing
        assert!(fields.iter().all(|f| f.wheel_speed <= 1));

        // Final frame forces the stop and clears the wheel level
        let last = fields.last().unwrap();
        assert!(!last.safety_ok);
        assert_eq!(last.wheel_speed, 0);
    }

    #[tokio::test]
    async fn test_run_bridge_keeps_going_after_send_errors() {
        let mut stream = start(vec![]);
        stop_after(&stream, Duration::from_millis(100));

        let mut sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let settings = BridgeSettings {
            rate_hz: 50,
            ..BridgeSettings::default()
        };
        let stats = run_bridge(&mut stream, &mut sink, settings).await;

        assert_eq!(stats.frames_sent, 0);
        assert!(stats.send_failures >= 3);
        assert!(stats.send_failures <= stats.ticks + 1);
    }

    #[tokio::test]
    async fn test_run_bridge_over_serial_link() {
        let mut stream = start(vec![]);
        stop_after(&stream, Duration::from_millis(60));

        let port = MockSerialPort::new();
        let mut link = SerialLink::with_port(port.clone(), "mock");
        let stats = run_bridge(&mut stream, &mut link, BridgeSettings::default()).await;

        let lines = port.written_lines();
        assert_eq!(lines.len() as u64, stats.frames_sent);
        assert_eq!(lines[0], "24,00,00,00,00,00,a5\r\n");
        for line in &lines {
            assert!(Frame::from_wire(line).unwrap().checksum_ok());
        }
    }
}
