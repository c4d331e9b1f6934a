//! # Controller Device Module
//!
//! Finds a supported controller among the Linux evdev nodes and reads its
//! events.
//!
//! ## Controller Detection
//!
//! Each `/dev/input/event*` node is matched by (vendor id, product id) against
//! the loaded [`ProfileRegistry`]. Sony controllers expose extra nodes with the
//! same ids for the touchpad and the motion sensors; those are recognised by
//! name and skipped.
//!
//! ## Reading
//!
//! The event loop talks to the device only through [`EventSource`], so tests
//! and replays can stand in for real hardware. A read never fails: it yields
//! an event, reports that nothing arrived in time, or reports that the device
//! is gone.

use async_trait::async_trait;
use evdev::{Device, EventStream, EventType, InputEvent};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::profile::ProfileRegistry;
use crate::error::{BridgeError, Result};

/// Name fragments of companion nodes (not the primary controller).
const COMPANION_NAME_TERMS: &[&str] = &["touchpad", "motion"];

/// `errno` reported once the device node has been removed.
const ENODEV: i32 = 19;

/// Input event type, reduced to what the mapper cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// EV_KEY (buttons)
    Key,
    /// EV_ABS (sticks, triggers, hat)
    Absolute,
    /// Sync reports, misc, and everything else
    Other,
}

/// One raw input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    #[must_use]
    pub const fn new(kind: EventKind, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }
}

impl From<InputEvent> for RawEvent {
    fn from(event: InputEvent) -> Self {
        let kind = match event.event_type() {
            EventType::KEY => EventKind::Key,
            EventType::ABSOLUTE => EventKind::Absolute,
            _ => EventKind::Other,
        };
        Self::new(kind, event.code(), event.value())
    }
}

/// Result of one read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// An event arrived.
    Event(RawEvent),
    /// Nothing arrived within the timeout, or a recoverable read hiccup.
    Idle,
    /// The device has gone away.
    Disconnected,
}

/// Source of raw controller events.
#[async_trait]
pub trait EventSource: Send {
    /// Waits up to `timeout` for the next event.
    async fn read_event(&mut self, timeout: Duration) -> ReadOutcome;

    /// Releases the underlying device. Reads afterwards report `Disconnected`.
    fn close(&mut self);

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// True if an advertised device name marks a companion sensor node.
///
/// # Examples
///
/// ```
/// use dualshock_bridge::controller::device::is_companion_node;
///
/// assert!(is_companion_node("Sony Interactive Entertainment Wireless Controller Touchpad"));
/// assert!(is_companion_node("Wireless Controller Motion Sensors"));
/// assert!(!is_companion_node("Wireless Controller"));
/// ```
#[must_use]
pub fn is_companion_node(name: &str) -> bool {
    let lower = name.to_lowercase();
    COMPANION_NAME_TERMS.iter().any(|term| lower.contains(term))
}

/// Picks the profile for a discovered node, or `None` if the node should be
/// skipped.
#[must_use]
pub fn select_profile<'a>(
    registry: &'a ProfileRegistry,
    vendor: u16,
    product: u16,
    name: &str,
) -> Option<&'a str> {
    let profile = registry.profile_for_device(vendor, product)?;
    if is_companion_node(name) {
        return None;
    }
    Some(profile)
}

/// A supported controller that has been opened.
#[derive(Debug)]
pub struct DiscoveredController {
    pub source: EvdevSource,
    pub profile_name: String,
}

/// evdev-backed event source.
pub struct EvdevSource {
    stream: Option<EventStream>,
    device_path: String,
    name: String,
}

impl std::fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevSource")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl EvdevSource {
    /// Detects and opens the first supported controller.
    ///
    /// Scans all `/dev/input/event*` devices in sorted order so the choice is
    /// deterministic when several controllers are connected.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no supported, non-companion controller found
    /// - `Io`: `/dev/input` cannot be read
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dualshock_bridge::controller::device::EvdevSource;
    /// use dualshock_bridge::controller::profile::ProfileRegistry;
    ///
    /// # async fn run() -> dualshock_bridge::error::Result<()> {
    /// let registry = ProfileRegistry::builtin()?;
    /// let found = EvdevSource::discover(&registry)?;
    /// println!("{} at {}", found.profile_name, found.source.device_path());
    /// # Ok(())
    /// # }
    /// ```
    pub fn discover(registry: &ProfileRegistry) -> Result<DiscoveredController> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            debug!("/dev/input does not exist");
            return Err(BridgeError::DeviceNotFound);
        }

        let mut paths: Vec<_> = std::fs::read_dir(input_dir)?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("event"))
            })
            .collect();
        paths.sort();

        for path in paths {
            match Device::open(&path) {
                Ok(device) => {
                    if let Some(found) = Self::try_claim(device, &path, registry)? {
                        return Ok(found);
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(BridgeError::DeviceNotFound)
    }

    /// Opens a specific event node, which must be a supported controller.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if the node is not a supported controller, `Io` if it
    /// cannot be opened.
    pub fn open_path<P: AsRef<Path>>(path: P, registry: &ProfileRegistry) -> Result<DiscoveredController> {
        let path = path.as_ref();
        let device = Device::open(path)?;
        Self::try_claim(device, path, registry)?.ok_or(BridgeError::DeviceNotFound)
    }

    fn try_claim(
        device: Device,
        path: &Path,
        registry: &ProfileRegistry,
    ) -> Result<Option<DiscoveredController>> {
        let id = device.input_id();
        let name = device.name().unwrap_or_default().to_string();
        debug!(
            "Found input device: {} '{}' (vendor: 0x{:04x}, product: 0x{:04x})",
            path.display(),
            name,
            id.vendor(),
            id.product()
        );

        let Some(profile_name) = select_profile(registry, id.vendor(), id.product(), &name) else {
            return Ok(None);
        };
        let profile_name = profile_name.to_string();

        let device_path = path.to_string_lossy().to_string();
        info!("Found {} controller '{}' at {}", profile_name, name, device_path);

        let stream = device.into_event_stream()?;
        Ok(Some(DiscoveredController {
            source: EvdevSource {
                stream: Some(stream),
                device_path,
                name,
            },
            profile_name,
        }))
    }

    /// The `/dev/input/eventX` path this controller was opened from.
    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Name the device advertises.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl EventSource for EvdevSource {
    async fn read_event(&mut self, timeout: Duration) -> ReadOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return ReadOutcome::Disconnected;
        };

        match tokio::time::timeout(timeout, stream.next_event()).await {
            Ok(Ok(event)) => ReadOutcome::Event(event.into()),
            Ok(Err(e)) => classify_read_error(&e),
            Err(_elapsed) => ReadOutcome::Idle,
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            info!("Closed controller at {}", self.device_path);
        }
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.name, self.device_path)
    }
}

fn classify_read_error(error: &io::Error) -> ReadOutcome {
    if error.raw_os_error() == Some(ENODEV) {
        warn!("Controller disconnected: {}", error);
        ReadOutcome::Disconnected
    } else {
        debug!("Transient read error: {}", error);
        ReadOutcome::Idle
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Event source that plays back a fixed script, then idles.
    pub struct ScriptedSource {
        script: VecDeque<ReadOutcome>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        pub fn new(script: impl IntoIterator<Item = ReadOutcome>) -> Self {
            Self {
                script: script.into_iter().collect(),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Flag that flips once `close()` has been called.
        pub fn closed_flag(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.closed)
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn read_event(&mut self, timeout: Duration) -> ReadOutcome {
            if self.closed.load(Ordering::SeqCst) {
                return ReadOutcome::Disconnected;
            }
            match self.script.pop_front() {
                Some(outcome) => outcome,
                None => {
                    tokio::time::sleep(timeout).await;
                    ReadOutcome::Idle
                }
            }
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "scripted source".to_string()
        }
    }
}
