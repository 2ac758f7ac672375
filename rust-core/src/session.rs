//! Tracking session lifecycle.
//!
//! A [`TrackingSession`] ties one sensor subscription to one
//! [`ActivityTracker`] and publishes a [`MotionSnapshot`] after every sample
//! through a `watch` channel, so any number of observers see the latest view
//! without back-pressure on the sensor.
//!
//! Lifecycle:
//! - `start` requests permission and, if granted, subscribes and begins
//!   calibrating. Refusal leaves the session in a terminal permission state.
//! - `pump`/`run` move readings from the subscription through the tracker.
//! - `stop` (or drop) releases the subscription.
//! - `restart` resets all tracking state and subscribes again.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::{Result, SensingError};
use crate::ingest::{MotionSource, SampleIngestor, SensorHandle};
use crate::pipeline::{ActivityTracker, SampleOutcome};
use crate::types::{ActivityState, MotionSnapshot, RawSample};

/// One tracking session over a motion source.
pub struct TrackingSession<S: MotionSource> {
    handle: Option<SensorHandle<S>>,
    tracker: ActivityTracker,
    ingestor: SampleIngestor<S>,
    snapshots: watch::Sender<MotionSnapshot>,
}

impl<S: MotionSource> TrackingSession<S> {
    /// Creates an idle session. Nothing is requested until [`begin`](Self::begin).
    pub fn new(source: Arc<S>, config: TrackerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let buffer = config.reading_buffer;
        let tracker = ActivityTracker::new(config)?;
        let (snapshots, _) = watch::channel(tracker.snapshot());

        Ok(Self {
            handle: None,
            tracker,
            ingestor: SampleIngestor::new(source, clock, buffer),
            snapshots,
        })
    }

    /// Create a session and begin tracking.
    ///
    /// A refused or failed permission request is not an error here: the
    /// session is returned in `PermissionDenied` or `PermissionError` and
    /// never processes a sample.
    pub async fn start(
        source: Arc<S>,
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut session = Self::new(source, config, clock)?;
        session.begin().await?;
        Ok(session)
    }

    /// Request the sensor and reset tracking state.
    ///
    /// Any existing subscription is released first.
    pub async fn begin(&mut self) -> Result<()> {
        self.handle = None;

        match self.ingestor.request_start().await {
            Ok(handle) => {
                self.tracker.begin();
                self.handle = Some(handle);
            }
            Err(err) => match err.terminal_state() {
                Some(state) => self.tracker.fail(state),
                None => return Err(err),
            },
        }
        self.publish();
        Ok(())
    }

    /// Wait for one reading and run it through the tracker.
    ///
    /// Returns `Ok(None)` when the source ends the stream; the session is
    /// stopped at that point.
    ///
    /// # Errors
    /// `SessionClosed` if the session is not subscribed.
    pub async fn pump(&mut self) -> Result<Option<SampleOutcome>> {
        let handle = self.handle.as_mut().ok_or(SensingError::SessionClosed)?;

        match handle.next_sample().await {
            Some(sample) => Ok(self.apply(&sample)),
            None => {
                debug!("motion stream ended");
                self.stop();
                Ok(None)
            }
        }
    }

    /// Process every reading already buffered, without waiting.
    pub fn pump_pending(&mut self) -> Result<usize> {
        let mut processed = 0;
        loop {
            let handle = self.handle.as_mut().ok_or(SensingError::SessionClosed)?;
            let Some(sample) = handle.try_next_sample() else {
                break;
            };
            if self.apply(&sample).is_some() {
                processed += 1;
            }
        }
        Ok(processed)
    }

    /// Pump until the source ends the stream. Returns the final snapshot.
    ///
    /// A session that never subscribed (permission refused) returns its
    /// snapshot immediately.
    pub async fn run(&mut self) -> Result<MotionSnapshot> {
        while self.handle.is_some() {
            if self.pump().await?.is_none() {
                break;
            }
        }
        Ok(self.snapshot())
    }

    /// Release the subscription. The last snapshot stays readable.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
            info!(
                steps = self.tracker.step_count(),
                samples = self.tracker.samples_processed(),
                "tracking session stopped"
            );
        }
    }

    /// Stop, reset every counter and subscribe again.
    pub async fn restart(&mut self) -> Result<()> {
        self.stop();
        self.begin().await
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        self.tracker.snapshot()
    }

    pub fn activity(&self) -> ActivityState {
        self.tracker.activity()
    }

    pub fn step_count(&self) -> u64 {
        self.tracker.step_count()
    }

    /// Subscribe to snapshot updates.
    pub fn watch_snapshots(&self) -> watch::Receiver<MotionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    fn apply(&mut self, sample: &RawSample) -> Option<SampleOutcome> {
        let outcome = self.tracker.process_sample(sample)?;
        self.snapshots.send_replace(outcome.snapshot);
        Some(outcome)
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.tracker.snapshot());
    }
}
