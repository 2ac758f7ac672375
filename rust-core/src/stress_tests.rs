//! Stress testing for the activity tracking pipeline.
//!
//! These tests push the pipeline through long, extreme or pathological input
//! to expose failure modes that only show up under sustained load.

use std::f32::consts::PI;
use std::sync::Arc;

use crate::clock::ManualClock;
use crate::config::TrackerConfig;
use crate::ingest::{ManualMotionSource, PermissionScript};
use crate::pipeline::ActivityTracker;
use crate::session::TrackingSession;
use crate::step_detection::PeakThreshold;
use crate::types::{ActivityState, DeviceMotionReading, RawSample};

fn begun_tracker(config: TrackerConfig) -> ActivityTracker {
    let mut tracker = ActivityTracker::new(config).unwrap();
    tracker.begin();
    tracker
}

/// Deterministic pseudo-noise in [-1, 1].
fn noise(i: u64) -> f32 {
    let x = i.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (x >> 33) as f32 / (1u64 << 31) as f32 * 2.0 - 1.0
}

// ============================================================================
// CATEGORY 1: EXTREME DURATION & THROUGHPUT
// ============================================================================

/// Ten minutes at 60Hz, alternating rest and walking every 30 seconds.
#[test]
fn stress_ten_minutes_mixed_activity_60hz() {
    let mut tracker = begun_tracker(TrackerConfig::default());
    let capacity = tracker.config().window.capacity;
    let mut last_steps = 0;
    let mut changes = 0;

    for i in 0..36_000u64 {
        let t = i * 16;
        let walking = (t / 30_000) % 2 == 1;
        let bounce = if walking {
            5.0 * (2.0 * PI * 1.8 * t as f32 / 1000.0).sin()
        } else {
            0.02 * noise(i)
        };

        let outcome = tracker
            .process_sample(&RawSample::new(t, [0.2, 0.1, 9.81 + bounce]))
            .unwrap();

        assert!(tracker.history().len() <= capacity);
        assert!(outcome.snapshot.intensity.is_finite());
        assert!(outcome.snapshot.intensity >= 0.0);
        assert!(outcome.snapshot.step_count >= last_steps);
        last_steps = outcome.snapshot.step_count;
        if outcome.activity_changed {
            changes += 1;
        }
    }

    assert_eq!(tracker.samples_processed(), 36_000);
    assert!(last_steps > 100, "only {} steps", last_steps);
    // Twenty rest/walk phases; debouncing keeps changes in the same order.
    assert!(changes < 200, "{} activity changes", changes);
}

/// High sample rate with no time between samples must not divide by zero.
#[test]
fn stress_identical_timestamps() {
    let mut tracker = begun_tracker(TrackerConfig::default());

    for i in 0..1_000u64 {
        let z = 9.81 + 5.0 * noise(i);
        tracker.process_sample(&RawSample::new(1_000, [0.0, 0.0, z]));
    }

    assert!(tracker.snapshot().intensity.is_finite());
    assert!(tracker.cadence_hz().is_finite());
    // All samples share one instant, so the refractory period admits one step.
    assert!(tracker.step_count() <= 1);
}

// ============================================================================
// CATEGORY 2: PATHOLOGICAL INPUT
// ============================================================================

/// Readings with huge magnitudes are clamped to the physical range and stay
/// finite and non-negative.
#[test]
fn stress_extreme_magnitudes() {
    let mut tracker = begun_tracker(TrackerConfig::default());

    for i in 0..2_000u64 {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let accel = [sign * 1.0e6, -sign * 1.0e6, 9.81 + sign * 1.0e6];
        let outcome = tracker.process_sample(&RawSample::new(i * 16, accel)).unwrap();
        assert!(outcome.snapshot.intensity.is_finite());
        assert!(outcome.snapshot.intensity >= 0.0);
    }
    assert_eq!(tracker.activity(), ActivityState::Jumping);
}

/// One overflow-scale reading in a calm stream is a transient: intensity
/// stays finite and the tracker settles back to rest without counting steps.
#[test]
fn stress_overflow_reading_recovers_to_rest() {
    let mut tracker = begun_tracker(TrackerConfig::default());
    let calm = [0.2, 0.1, 9.81];
    let mut t = 0u64;

    for _ in 0..60 {
        tracker.process_sample(&RawSample::new(t, calm));
        t += 16;
    }
    assert_eq!(tracker.activity(), ActivityState::AtRest);

    let outcome = tracker
        .process_sample(&RawSample::new(t, [1.0e20, 0.0, 9.81]))
        .unwrap();
    t += 16;
    assert!(outcome.snapshot.intensity.is_finite());
    assert_eq!(tracker.activity(), ActivityState::Jumping);

    let mut settled_steps = None;
    for i in 0..2_000u64 {
        let outcome = tracker.process_sample(&RawSample::new(t, calm)).unwrap();
        t += 16;
        assert!(outcome.snapshot.intensity.is_finite());
        assert!(tracker.history().std_dev().is_finite());
        if i == 300 {
            settled_steps = Some(tracker.step_count());
        }
    }

    // The decaying spike may pass for a couple of peaks; calm data never does.
    assert!(tracker.step_count() <= 5, "{} steps", tracker.step_count());
    assert_eq!(Some(tracker.step_count()), settled_steps);
    assert_eq!(tracker.activity(), ActivityState::AtRest);
    assert!(tracker.snapshot().intensity < 0.5);
}

/// Timestamps that jump backwards must not panic on subtraction.
#[test]
fn stress_non_monotonic_timestamps() {
    let mut tracker = begun_tracker(TrackerConfig::default());

    for i in 0..3_000u64 {
        let t = if i % 7 == 0 { 0 } else { i * 16 };
        let z = 9.81 + 6.0 * (i as f32 * 0.3).sin();
        tracker.process_sample(&RawSample::new(t, [0.0, 0.0, z]));
    }

    assert!(tracker.snapshot().intensity.is_finite());
}

/// Garbage readings from the platform degrade to zeros instead of poisoning
/// the filters.
#[tokio::test]
async fn stress_non_finite_readings() {
    let source = Arc::new(ManualMotionSource::new(PermissionScript::Grant));
    let mut session = TrackingSession::start(
        Arc::clone(&source),
        TrackerConfig::default(),
        Arc::new(ManualClock::new(0)),
    )
    .await
    .unwrap();

    for i in 0..500u64 {
        let reading = match i % 4 {
            0 => DeviceMotionReading::new(f32::NAN, 0.1, 9.81),
            1 => DeviceMotionReading::new(0.0, f32::INFINITY, 9.81),
            2 => DeviceMotionReading::new(0.0, 0.0, f32::NEG_INFINITY),
            _ => DeviceMotionReading::default(),
        };
        source.emit(reading.at(i * 16));
        session.pump().await.unwrap();
    }

    let snapshot = session.snapshot();
    assert!(snapshot.intensity.is_finite());
    assert!(snapshot.linear_acceleration.magnitude().is_finite());
    assert_eq!(session.tracker().samples_processed(), 500);
}

// ============================================================================
// CATEGORY 3: CONFIGURATION EXTREMES
// ============================================================================

/// Adaptive peak threshold under heavy noise never counts faster than the
/// refractory interval allows.
#[test]
fn stress_adaptive_threshold_noisy_signal() {
    let mut config = TrackerConfig::default();
    config.step.peak_threshold = PeakThreshold::Adaptive {
        floor: 1.5,
        factor: 2.5,
    };
    let refractory = config.step.refractory_ms;
    let mut tracker = begun_tracker(config);

    let samples = 10_000u64;
    for i in 0..samples {
        let z = 9.81 + 8.0 * noise(i);
        tracker.process_sample(&RawSample::new(i * 16, [0.0, 0.0, z]));
    }

    assert!(tracker.step_count() <= samples * 16 / refractory + 1);
}

/// Smallest legal window: capacity equals the calibration fill.
#[test]
fn stress_minimal_window() {
    let mut config = TrackerConfig::default();
    config.window.capacity = 1;
    config.window.min_fill = 1;
    let mut tracker = begun_tracker(config);

    for i in 0..5_000u64 {
        let z = 9.81 + 4.0 * (i as f32 * 0.2).sin();
        tracker.process_sample(&RawSample::new(i * 16, [0.0, 0.0, z]));
        assert_eq!(tracker.history().len(), 1);
    }
    // A single-entry window has zero variance, so no step passes the gate.
    assert_eq!(tracker.step_count(), 0);
}

// ============================================================================
// CATEGORY 4: SESSION CHURN
// ============================================================================

/// Many sessions on one source: every restart and drop releases its
/// subscription and nothing leaks between sessions.
#[tokio::test]
async fn stress_session_churn() {
    let source = Arc::new(ManualMotionSource::new(PermissionScript::Grant));

    for round in 0..50u64 {
        let mut session = TrackingSession::start(
            Arc::clone(&source),
            TrackerConfig::default(),
            Arc::new(ManualClock::new(0)),
        )
        .await
        .unwrap();
        assert_eq!(source.subscriber_count(), 1);
        assert_eq!(session.step_count(), 0);

        for i in 0..20u64 {
            let z = 9.81 + 6.0 * (2.0 * PI * 1.5 * (i * 16) as f32 / 1000.0).sin();
            source.emit(DeviceMotionReading::new(0.0, 0.0, z).at(round * 10_000 + i * 16));
        }
        session.pump_pending().unwrap();

        if round % 2 == 0 {
            session.restart().await.unwrap();
            assert_eq!(source.subscriber_count(), 1);
        }
    }

    assert_eq!(source.subscriber_count(), 0);
    assert_eq!(source.permission_requests(), 75);
}

/// Concurrent sessions on separate tasks each own their state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_parallel_sessions() {
    let mut tasks = Vec::new();

    for n in 0..8u64 {
        tasks.push(tokio::spawn(async move {
            let source = Arc::new(ManualMotionSource::new(PermissionScript::Grant));
            let mut session = TrackingSession::start(
                Arc::clone(&source),
                TrackerConfig::default(),
                Arc::new(ManualClock::new(0)),
            )
            .await
            .unwrap();

            let walking = n % 2 == 0;
            for i in 0..400u64 {
                let t = i * 16;
                let bounce = if walking {
                    6.0 * (2.0 * PI * 1.5 * t as f32 / 1000.0).sin()
                } else {
                    0.0
                };
                source.emit(DeviceMotionReading::new(0.2, 0.1, 9.81 + bounce).at(t));
                session.pump().await.unwrap();
            }
            (walking, session.snapshot())
        }));
    }

    for task in tasks {
        let (walking, snapshot) = task.await.unwrap();
        if walking {
            assert!(snapshot.step_count > 0);
        } else {
            assert_eq!(snapshot.step_count, 0);
            assert_eq!(snapshot.activity, ActivityState::AtRest);
        }
    }
}
