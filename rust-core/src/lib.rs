//! Activity Sensing Engine Library
//!
//! Real-time activity classification from raw phone accelerometer streams.
//! Samples arrive with gravity included at the platform rate (~60Hz); the
//! engine separates gravity, smooths the motion magnitude, windows it, counts
//! steps and classifies the current activity with debounced transitions.
//!
//! # Design Philosophy
//!
//! - **One owner per session**: all tracking state lives in an
//!   [`ActivityTracker`]; sessions never share anything.
//! - **Constant work per sample**: a bounded sequence of arithmetic with no
//!   blocking and no allocation after construction.
//! - **Permission before data**: no reading reaches the pipeline until the
//!   platform grants sensor access, and the subscription is released on
//!   every exit path.
//! - **No flicker**: a classified activity is only shown once it is stable,
//!   except for fast-onset states like jumping.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use activity_sensing::{
//!     DeviceMotionReading, ManualClock, ManualMotionSource, TrackerConfig, TrackingSession,
//! };
//!
//! let source = Arc::new(ManualMotionSource::granting());
//! let mut session = TrackingSession::start(
//!     Arc::clone(&source),
//!     TrackerConfig::default(),
//!     Arc::new(ManualClock::new(0)),
//! )
//! .await?;
//!
//! source.emit(DeviceMotionReading::new(0.1, 0.2, 9.8));
//! session.pump_pending()?;
//! println!("{}", session.activity());
//! ```

pub mod classifier;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod session;
pub mod signal;
pub mod step_detection;
pub mod types;
pub mod window;

#[cfg(test)]
mod stress_tests;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::TrackerConfig;
pub use error::{Result, SensingError};
pub use ingest::{
    Delivery, ManualMotionSource, MotionSource, PermissionScript, PermissionStatus, ReadingSink,
    SensorHandle,
};
pub use pipeline::{ActivityTracker, SampleOutcome};
pub use session::TrackingSession;
pub use types::{
    ActivityState, ActivityTier, DeviceMotionReading, LinearSample, MotionSnapshot, RawSample,
};
