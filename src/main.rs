//! # DualShock Bridge
//!
//! Drive a remote machine from a DualShock 4 / DualSense controller over a
//! serial link.
//!
//! # Usage
//!
//! ```bash
//! dualshock-bridge [CONFIG.toml]
//! ```
//!
//! Without an argument `config/default.toml` is used if present, otherwise
//! built-in defaults. The output mode comes from `[output] mode`.
//!
//! Expected output (bridge mode, logs on stderr):
//! ```text
//! INFO dualshock_bridge: DualShock Bridge v0.1.0 starting...
//! INFO dualshock_bridge::controller::device: Found DualShock4 controller 'Wireless Controller' at /dev/input/event5
//! INFO dualshock_bridge::serial: Opened serial port /dev/ttyUSB0 at 115200 baud
//! INFO dualshock_bridge::bridge::driver: Bridge running at 5 Hz (safety stop engaged)
//! ```

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use dualshock_bridge::bridge::{
    run_bridge, run_json, BridgeSettings, ControllerReader, DebugSink, SnapshotStream, StopHandle,
};
use dualshock_bridge::config::{Config, LoggingConfig, OutputMode};
use dualshock_bridge::controller::device::EvdevSource;
use dualshock_bridge::controller::profile::ProfileRegistry;
use dualshock_bridge::serial::{FrameSink, SerialLink};

/// Log file name prefix inside `[logging] log_dir`
const LOG_FILE_PREFIX: &str = "dualshock-bridge.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args(std::env::args_os());
    let config = Config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    let _log_guard = init_logging(&config.logging);

    info!("DualShock Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: defaults"),
    }

    let mut registry = ProfileRegistry::builtin()?;
    if !config.controller.profiles_dir.is_empty() {
        let loaded = registry
            .extend_from_dir(&config.controller.profiles_dir)
            .with_context(|| format!("Failed to load profiles from {}", config.controller.profiles_dir))?;
        info!("Loaded {} extra controller profiles", loaded);
    }

    let found = if config.controller.device_path.is_empty() {
        EvdevSource::discover(&registry)?
    } else {
        EvdevSource::open_path(&config.controller.device_path, &registry)
            .with_context(|| format!("Failed to open {}", config.controller.device_path))?
    };
    let profile = registry.get(&found.profile_name)?.clone();

    // Open the transport before starting the session so a bad port fails fast.
    let sink: Option<Box<dyn FrameSink>> = match config.output.mode {
        OutputMode::Bridge => Some(Box::new(SerialLink::open(
            &config.serial.port,
            config.serial.baud_rate,
        )?)),
        OutputMode::Debug => Some(Box::new(DebugSink::stdout())),
        OutputMode::Json => None,
    };

    let mut stream =
        ControllerReader::new(Box::new(found.source), profile, config.controller.deadzone).start();
    stop_on_signal(&stream);

    info!("Press Ctrl+C to exit");

    match sink {
        Some(mut sink) => {
            let stats = run_bridge(&mut stream, sink.as_mut(), bridge_settings(&config)).await;
            if stats.send_failures > 0 {
                warn!("{} frames could not be sent", stats.send_failures);
            }
        }
        None => {
            let lines = run_json(&mut stream, &mut io::stdout()).await?;
            info!("Wrote {} status lines", lines);
        }
    }

    Ok(())
}

/// First command-line argument, if any, is the configuration path.
fn config_path_from_args(args: impl IntoIterator<Item = OsString>) -> Option<PathBuf> {
    args.into_iter().nth(1).map(PathBuf::from)
}

fn bridge_settings(config: &Config) -> BridgeSettings {
    BridgeSettings {
        rate_hz: config.transmission.rate_hz,
        start_in_safety_stop: config.transmission.start_in_safety_stop,
        bindings: config.bindings,
    }
}

/// Sets up logging to stderr, plus a daily rolling file when `log_dir` is set.
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must live until exit so buffered file output is flushed.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if logging.log_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

/// Stops the session on Ctrl+C or SIGTERM; the drivers then run their
/// shutdown path (device reset and close, final safety-stop frame).
fn stop_on_signal(stream: &SnapshotStream) {
    tokio::spawn(stop_when(termination_requested(), stream.stop_handle()));
}

/// Waits for `signal`, then stops the session.
async fn stop_when(signal: impl Future<Output = &'static str>, stop: StopHandle) {
    let name = signal.await;
    info!("Received {}, shutting down...", name);
    stop.stop();
}

/// Resolves with the name of the first termination request received.
async fn termination_requested() -> &'static str {
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            name = interrupt() => name,
            _ = terminate.recv() => "SIGTERM",
        },
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            interrupt().await
        }
    }
}

/// Ctrl+C; never resolves if the handler cannot be installed.
async fn interrupt() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
