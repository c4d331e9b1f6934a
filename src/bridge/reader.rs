//! # Controller Reader
//!
//! Runs the two input cadences of a session.
//!
//! - Ingestion: a spawned task reads raw events as fast as the device delivers
//!   them and routes them into the [`InputStateTable`].
//! - Snapshots: [`SnapshotStream::next`] ticks at 50 Hz, copies the table,
//!   and normalizes the copy outside the lock.
//!
//! Both stop on one [`CancellationToken`]. Every exit path resets the table to
//! neutral and closes the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::device::{EventSource, ReadOutcome};
use crate::controller::input_state::{InputSnapshot, InputStateTable};
use crate::controller::mapper::{Normalizer, RoutingTable};
use crate::controller::profile::DeviceProfile;

/// Snapshot cadence in Hz
pub const SNAPSHOT_RATE_HZ: u32 = 50;

/// How long one device read may block
pub const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Pause after a read that produced nothing
pub const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Pause between read attempts while the device is gone
pub const DISCONNECT_BACKOFF: Duration = Duration::from_millis(10);

/// Shared flag: is the controller still delivering?
#[derive(Debug, Clone)]
pub struct DeviceLiveness(Arc<AtomicBool>);

impl DeviceLiveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Marks the device live again. Returns `true` if it had been lost.
    pub fn mark_live(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Marks the device lost. Returns `true` if it had been live.
    pub fn mark_lost(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for DeviceLiveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle that ends a running session.
#[derive(Debug, Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    pub fn stop(&self) {
        self.0.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Wraps an existing token; stopping the handle cancels it.
impl From<CancellationToken> for StopHandle {
    fn from(token: CancellationToken) -> Self {
        Self(token)
    }
}

/// Everything needed to start one session.
pub struct ControllerReader {
    source: Box<dyn EventSource>,
    routing: RoutingTable,
    normalizer: Normalizer,
}

impl std::fmt::Debug for ControllerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerReader")
            .field("source", &self.source.describe())
            .field("routes", &self.routing.len())
            .field("deadzone", &self.normalizer.deadzone())
            .finish()
    }
}

impl ControllerReader {
    /// Prepares a session for `source` using `profile`'s codes and calibration.
    ///
    /// # Arguments
    ///
    /// * `source` - Opened event source
    /// * `profile` - Capability profile of that device
    /// * `deadzone` - Stick deadzone in normalized units
    pub fn new(source: Box<dyn EventSource>, profile: DeviceProfile, deadzone: i32) -> Self {
        let routing = RoutingTable::build(&profile);
        Self {
            source,
            routing,
            normalizer: Normalizer::new(profile, deadzone),
        }
    }

    /// Spawns ingestion and returns the snapshot stream.
    ///
    /// Must be called inside a Tokio runtime. A stream covers one session;
    /// a new session needs a new reader.
    pub fn start(self) -> SnapshotStream {
        let table = Arc::new(InputStateTable::new());
        let liveness = DeviceLiveness::new();
        let cancel = CancellationToken::new();

        info!(
            "Starting input session for {} ({} routes, deadzone {})",
            self.source.describe(),
            self.routing.len(),
            self.normalizer.deadzone()
        );

        let ingestion = tokio::spawn(ingest(
            self.source,
            self.routing,
            Arc::clone(&table),
            liveness.clone(),
            cancel.clone(),
        ));

        let mut ticker = interval(Duration::from_secs(1) / SNAPSHOT_RATE_HZ);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        SnapshotStream {
            table,
            normalizer: self.normalizer,
            liveness,
            cancel,
            ticker,
            ingestion: Some(ingestion),
        }
    }
}

/// Ingestion task body. Closes the source on exit.
async fn ingest(
    mut source: Box<dyn EventSource>,
    routing: RoutingTable,
    table: Arc<InputStateTable>,
    liveness: DeviceLiveness,
    cancel: CancellationToken,
) {
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = source.read_event(READ_TIMEOUT) => outcome,
        };

        match outcome {
            ReadOutcome::Event(event) => {
                if liveness.mark_live() {
                    info!("Controller delivering events again");
                }
                if routing.apply(&table, &event) {
                    debug!("{:?} {} = {}", event.kind, event.code, event.value);
                }
            }
            ReadOutcome::Idle => sleep(IDLE_BACKOFF).await,
            ReadOutcome::Disconnected => {
                if liveness.mark_lost() {
                    warn!("Controller lost, holding neutral input");
                }
                sleep(DISCONNECT_BACKOFF).await;
            }
        }
    }

    source.close();
    debug!("Ingestion stopped");
}

/// Normalized snapshots at 50 Hz until stopped.
pub struct SnapshotStream {
    table: Arc<InputStateTable>,
    normalizer: Normalizer,
    liveness: DeviceLiveness,
    cancel: CancellationToken,
    ticker: Interval,
    ingestion: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("live", &self.liveness.is_live())
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SnapshotStream {
    /// Waits for the next tick and returns a normalized snapshot, or `None`
    /// once the session has been stopped.
    pub async fn next(&mut self) -> Option<InputSnapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return None,
            _ = self.ticker.tick() => {}
        }

        if !self.liveness.is_live() {
            self.table.reset();
        }

        let raw = self.table.snapshot();
        Some(self.normalizer.normalize(&raw))
    }

    /// Ends the session: cancels ingestion, resets the table, and waits for
    /// the device to be closed. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.table.reset();

        if let Some(handle) = self.ingestion.take() {
            if let Err(e) = handle.await {
                warn!("Ingestion task ended abnormally: {}", e);
            }
            info!("Input session stopped");
        }
    }

    /// Handle that stops this session from elsewhere (e.g. a signal task).
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.cancel.clone())
    }

    /// Liveness flag shared with the ingestion task.
    pub fn liveness(&self) -> &DeviceLiveness {
        &self.liveness
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        // Without an await the task is only signalled; it still closes the device.
        self.cancel.cancel();
        self.table.reset();
    }
}
