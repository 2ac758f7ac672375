//! Activity Sensing Replay
//!
//! Feeds a recorded stream of device motion readings through a tracking
//! session and reports every committed activity change.
//!
//! Input is JSON lines, one reading per line, every field optional:
//!
//! ```text
//! {"x": 0.12, "y": -0.30, "z": 9.79, "timestamp_ms": 16}
//! {"x": 0.10, "z": 9.81}
//! ```
//!
//! Readings without a timestamp are stamped `--interval-ms` after the
//! previous one.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use activity_sensing::{
    Clock, DeviceMotionReading, ManualClock, ManualMotionSource, PermissionScript, TrackerConfig,
    TrackingSession,
};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "activity-sensing",
    about = "Replay recorded accelerometer readings through the activity classifier"
)]
struct ReplayArgs {
    /// JSON-lines file of motion readings
    input: PathBuf,

    /// Tracker configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spacing used for readings without a timestamp
    #[arg(long, default_value_t = 16)]
    interval_ms: u64,

    /// Simulate the user refusing sensor access
    #[arg(long)]
    deny_permission: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "activity_sensing=info".into()),
        )
        .init();

    let args = ReplayArgs::parse();

    let config = match &args.config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    let full_scale = config.intensity_full_scale;

    let script = if args.deny_permission {
        PermissionScript::Deny
    } else {
        PermissionScript::Grant
    };
    let source = Arc::new(ManualMotionSource::new(script));
    let clock = ManualClock::new(0);

    let mut session =
        TrackingSession::start(Arc::clone(&source), config, Arc::new(clock.clone())).await?;
    if !session.is_running() {
        warn!(activity = %session.activity(), "session did not start");
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
        return Ok(());
    }

    let file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let mut readings = 0u64;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reading: DeviceMotionReading = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed reading", index + 1))?;

        match reading.timestamp_ms {
            Some(ts) => clock.set(ts),
            None => {
                clock.advance(args.interval_ms);
            }
        }

        source.emit(reading);
        readings += 1;

        if let Some(outcome) = session.pump().await? {
            if outcome.activity_changed {
                println!(
                    "{:>8} ms  {:<18} steps={:<5} intensity={:>5.1}%",
                    clock.now_ms(),
                    outcome.snapshot.activity.label(),
                    outcome.snapshot.step_count,
                    outcome.snapshot.intensity_percent(full_scale),
                );
            }
        }
    }

    session.stop();
    let snapshot = session.snapshot();
    info!(
        readings,
        steps = snapshot.step_count,
        cadence_hz = session.tracker().cadence_hz(),
        "replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
