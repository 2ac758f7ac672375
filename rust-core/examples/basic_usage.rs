/// Basic usage example: start a session, feed readings, watch the activity
use std::f32::consts::PI;
use std::sync::Arc;

use activity_sensing::{
    ActivityState, DeviceMotionReading, ManualClock, ManualMotionSource, MotionSnapshot,
    TrackerConfig, TrackingSession,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> activity_sensing::Result<()> {
    println!("=== Activity Sensing Engine: Basic Example ===\n");

    // The manual source stands in for the phone's motion sensor.
    let source = Arc::new(ManualMotionSource::granting());
    let config = TrackerConfig::default();
    let full_scale = config.intensity_full_scale;
    let mut session =
        TrackingSession::start(Arc::clone(&source), config, Arc::new(ManualClock::new(0))).await?;

    // Simulate a user standing still, walking, jumping once, then resting.
    let mut readings = Vec::new();
    let mut t = 0u64;
    phase(&mut readings, &mut t, 90, |_| 0.0);
    phase(&mut readings, &mut t, 300, |t| 6.0 * (2.0 * PI * 1.5 * t as f32 / 1000.0).sin());
    phase(&mut readings, &mut t, 1, |_| 80.0);
    phase(&mut readings, &mut t, 120, |_| 0.0);

    println!("Processing {} readings...\n", readings.len());

    for reading in readings {
        source.emit(reading);
        if let Some(outcome) = session.pump().await? {
            if outcome.activity_changed {
                print_snapshot(&outcome.snapshot, full_scale);
            }
        }
    }

    session.stop();

    let snapshot = session.snapshot();
    println!("\n=== Summary ===");
    println!("Final activity: {}", snapshot.activity);
    println!("Steps counted: {}", snapshot.step_count);
    println!("Cadence: {:.2} steps/s", session.tracker().cadence_hz());
    if snapshot.activity == ActivityState::AtRest {
        println!("User came to rest.");
    }

    Ok(())
}

/// Append `count` readings 16ms apart with a vertical bounce on top of gravity.
fn phase(
    readings: &mut Vec<DeviceMotionReading>,
    t: &mut u64,
    count: usize,
    bounce: impl Fn(u64) -> f32,
) {
    for _ in 0..count {
        readings.push(DeviceMotionReading::new(0.2, 0.1, 9.81 + bounce(*t)).at(*t));
        *t += 16;
    }
}

fn print_snapshot(snapshot: &MotionSnapshot, full_scale: f32) {
    println!(
        "[{:>6} ms] {:<18} ({:?}) steps={:<3} intensity={:>5.1}%",
        snapshot.timestamp_ms,
        snapshot.activity.label(),
        snapshot.activity.tier(),
        snapshot.step_count,
        snapshot.intensity_percent(full_scale),
    );
}
