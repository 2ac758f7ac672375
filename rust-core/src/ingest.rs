//! Sample ingestion from a platform motion sensor.
//!
//! The platform side is abstracted as a [`MotionSource`]: an optional
//! asynchronous permission request followed by a subscribe/unsubscribe pair
//! that delivers [`DeviceMotionReading`]s into a [`ReadingSink`]. The sink
//! stamps each reading from the session clock at the moment it is handed
//! over, so buffering never shifts sample times.
//!
//! [`SampleIngestor::request_start`] is the only way to obtain a subscription,
//! and it never subscribes unless permission resolved to granted. The returned
//! [`SensorHandle`] owns the subscription and unsubscribes when dropped, so no
//! reading can be delivered to a session after teardown, whichever path the
//! teardown takes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::error::{Result, SensingError};
use crate::types::{DeviceMotionReading, RawSample};

/// Answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Identifies one subscription on a [`MotionSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Result of handing one reading to a [`ReadingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    /// The subscriber's buffer was full; the reading is lost.
    Dropped,
    /// The subscriber is gone. The source should forget the sink.
    Closed,
}

/// Delivery end of one subscription.
#[derive(Clone)]
pub struct ReadingSink {
    tx: mpsc::Sender<RawSample>,
    clock: Arc<dyn Clock>,
}

impl ReadingSink {
    /// Stamp `reading` with the clock unless it carries its own timestamp,
    /// then queue it for the session.
    pub fn deliver(&self, reading: DeviceMotionReading) -> Delivery {
        let raw = reading.to_raw(self.clock.now_ms());
        match self.tx.try_send(raw) {
            Ok(()) => {
                trace!(t = raw.timestamp_ms, "reading delivered");
                Delivery::Accepted
            }
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// A platform motion sensor.
#[async_trait]
pub trait MotionSource: Send + Sync {
    /// Whether the platform needs explicit consent before subscribing.
    fn requires_permission(&self) -> bool {
        true
    }

    /// Ask the user for sensor access.
    ///
    /// `Err` means the request itself failed, as opposed to being answered.
    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Start delivering readings into `sink`.
    fn subscribe(&self, sink: ReadingSink) -> SubscriptionId;

    /// Stop delivering readings for `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Gates the sensor subscription behind the permission request.
pub struct SampleIngestor<S: MotionSource> {
    source: Arc<S>,
    clock: Arc<dyn Clock>,
    buffer: usize,
}

impl<S: MotionSource> SampleIngestor<S> {
    pub fn new(source: Arc<S>, clock: Arc<dyn Clock>, buffer: usize) -> Self {
        Self {
            source,
            clock,
            buffer: buffer.max(1),
        }
    }

    /// Request permission (when the platform needs it) and subscribe.
    ///
    /// # Errors
    /// - `PermissionDenied` if the user refused
    /// - `PermissionRequest` if the request failed
    ///
    /// No subscription exists after either error.
    pub async fn request_start(&self) -> Result<SensorHandle<S>> {
        if self.source.requires_permission() {
            match self.source.request_permission().await {
                Ok(PermissionStatus::Granted) => {
                    debug!("motion permission granted");
                }
                Ok(PermissionStatus::Denied) => {
                    warn!("motion permission denied");
                    return Err(SensingError::PermissionDenied);
                }
                Err(err) => {
                    warn!(error = %err, "motion permission request failed");
                    return Err(match err {
                        SensingError::PermissionRequest(msg) => {
                            SensingError::PermissionRequest(msg)
                        }
                        other => SensingError::PermissionRequest(other.to_string()),
                    });
                }
            }
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.source.subscribe(ReadingSink {
            tx,
            clock: Arc::clone(&self.clock),
        });
        info!(subscription = id.0, "subscribed to motion sensor");

        Ok(SensorHandle {
            source: Arc::clone(&self.source),
            id: Some(id),
            rx,
        })
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }
}

/// An active sensor subscription. Unsubscribes on drop.
pub struct SensorHandle<S: MotionSource> {
    source: Arc<S>,
    id: Option<SubscriptionId>,
    rx: mpsc::Receiver<RawSample>,
}

impl<S: MotionSource> SensorHandle<S> {
    /// Wait for the next delivered sample.
    ///
    /// Returns `None` once the source stops delivering.
    pub async fn next_sample(&mut self) -> Option<RawSample> {
        self.rx.recv().await
    }

    /// Take a buffered sample without waiting.
    pub fn try_next_sample(&mut self) -> Option<RawSample> {
        self.rx.try_recv().ok()
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.id
    }

    /// Unsubscribe now. Equivalent to dropping the handle.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            self.rx.close();
            self.source.unsubscribe(id);
            info!(subscription = id.0, "unsubscribed from motion sensor");
        }
    }
}

impl<S: MotionSource> Drop for SensorHandle<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scripted answer for [`ManualMotionSource`] permission requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionScript {
    /// The platform never asks.
    NotRequired,
    Grant,
    Deny,
    /// The request fails with the given message.
    Fail(String),
}

/// In-process motion source driven by calls to [`ManualMotionSource::emit`].
///
/// Stands in for the platform sensor in replays, demos and tests.
pub struct ManualMotionSource {
    permission: PermissionScript,
    subscribers: DashMap<SubscriptionId, ReadingSink>,
    next_id: AtomicU64,
    permission_requests: AtomicUsize,
}

impl ManualMotionSource {
    pub fn new(permission: PermissionScript) -> Self {
        Self {
            permission,
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            permission_requests: AtomicUsize::new(0),
        }
    }

    /// Source whose permission request is granted.
    pub fn granting() -> Self {
        Self::new(PermissionScript::Grant)
    }

    /// Deliver a reading to every subscriber. Returns how many received it.
    ///
    /// Readings are dropped for subscribers whose buffer is full, as a
    /// platform event bus would.
    pub fn emit(&self, reading: DeviceMotionReading) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().deliver(reading) {
                Delivery::Accepted => delivered += 1,
                Delivery::Dropped => {
                    trace!(subscription = entry.key().0, "subscriber buffer full");
                }
                Delivery::Closed => closed.push(*entry.key()),
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
        delivered
    }

    /// Drop every subscription, signalling end of stream to receivers.
    pub fn end_stream(&self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of permission requests received so far.
    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MotionSource for ManualMotionSource {
    fn requires_permission(&self) -> bool {
        self.permission != PermissionScript::NotRequired
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        match &self.permission {
            PermissionScript::NotRequired | PermissionScript::Grant => {
                Ok(PermissionStatus::Granted)
            }
            PermissionScript::Deny => Ok(PermissionStatus::Denied),
            PermissionScript::Fail(msg) => Err(SensingError::PermissionRequest(msg.clone())),
        }
    }

    fn subscribe(&self, sink: ReadingSink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.insert(id, sink);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    type Fixture = (
        Arc<ManualMotionSource>,
        ManualClock,
        SampleIngestor<ManualMotionSource>,
    );

    fn ingestor(script: PermissionScript) -> Fixture {
        let source = Arc::new(ManualMotionSource::new(script));
        let clock = ManualClock::new(0);
        let ingestor = SampleIngestor::new(Arc::clone(&source), Arc::new(clock.clone()), 16);
        (source, clock, ingestor)
    }

    #[tokio::test]
    async fn test_granted_permission_subscribes_once() {
        let (source, _clock, ingestor) = ingestor(PermissionScript::Grant);

        let handle = ingestor.request_start().await.unwrap();

        assert_eq!(source.permission_requests(), 1);
        assert_eq!(source.subscriber_count(), 1);
        assert!(handle.subscription().is_some());
    }

    #[tokio::test]
    async fn test_denied_permission_never_subscribes() {
        let (source, _clock, ingestor) = ingestor(PermissionScript::Deny);

        let err = ingestor.request_start().await.err().unwrap();

        assert!(matches!(err, SensingError::PermissionDenied));
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.emit(DeviceMotionReading::new(0.0, 0.0, 9.81)), 0);
    }

    #[tokio::test]
    async fn test_failed_permission_request() {
        let script = PermissionScript::Fail("not allowed in iframe".into());
        let (source, _clock, ingestor) = ingestor(script);

        let err = ingestor.request_start().await.err().unwrap();

        assert!(
            matches!(err, SensingError::PermissionRequest(ref m) if m == "not allowed in iframe")
        );
        assert_eq!(source.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_platform_without_permission_step() {
        let (source, _clock, ingestor) = ingestor(PermissionScript::NotRequired);

        let _handle = ingestor.request_start().await.unwrap();

        assert_eq!(source.permission_requests(), 0);
        assert_eq!(source.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_readings_are_stamped_by_clock() {
        let (source, clock, ingestor) = ingestor(PermissionScript::Grant);
        let mut handle = ingestor.request_start().await.unwrap();

        clock.set(1234);
        source.emit(DeviceMotionReading {
            x: None,
            y: Some(1.0),
            z: Some(9.0),
            timestamp_ms: None,
        });

        let sample = handle.next_sample().await.unwrap();
        assert_eq!(sample.timestamp_ms, 1234);
        assert_eq!(sample.accel, [0.0, 1.0, 9.0]);
        assert!(handle.try_next_sample().is_none());
    }

    #[tokio::test]
    async fn test_readings_stamped_at_delivery_not_at_drain() {
        let (source, clock, ingestor) = ingestor(PermissionScript::Grant);
        let mut handle = ingestor.request_start().await.unwrap();

        for _ in 0..12 {
            clock.advance(100);
            source.emit(DeviceMotionReading::new(0.0, 0.0, 9.81));
        }
        clock.set(60_000);

        let times: Vec<u64> = std::iter::from_fn(|| handle.try_next_sample())
            .map(|sample| sample.timestamp_ms)
            .collect();
        assert_eq!(times, (1..=12).map(|i| i * 100).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_platform_timestamp_wins_over_clock() {
        let (source, clock, ingestor) = ingestor(PermissionScript::Grant);
        let mut handle = ingestor.request_start().await.unwrap();

        clock.set(9_000);
        source.emit(DeviceMotionReading::new(0.0, 0.0, 9.81).at(42));

        assert_eq!(handle.try_next_sample().unwrap().timestamp_ms, 42);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let (source, _clock, ingestor) = ingestor(PermissionScript::Grant);
        let handle = ingestor.request_start().await.unwrap();
        assert_eq!(source.subscriber_count(), 1);

        drop(handle);

        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.emit(DeviceMotionReading::new(1.0, 1.0, 1.0)), 0);
    }

    #[tokio::test]
    async fn test_close_unsubscribes() {
        let (source, _clock, ingestor) = ingestor(PermissionScript::Grant);
        let handle = ingestor.request_start().await.unwrap();

        handle.close();

        assert_eq!(source.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_end_stream_finishes_receiver() {
        let (source, _clock, ingestor) = ingestor(PermissionScript::Grant);
        let mut handle = ingestor.request_start().await.unwrap();

        source.emit(DeviceMotionReading::new(0.0, 0.0, 9.81));
        source.end_stream();

        assert!(handle.next_sample().await.is_some());
        assert!(handle.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn test_full_buffer_drops_readings() {
        let source = Arc::new(ManualMotionSource::granting());
        let clock = Arc::new(ManualClock::new(0));
        let ingestor = SampleIngestor::new(Arc::clone(&source), clock, 2);
        let mut handle = ingestor.request_start().await.unwrap();

        let delivered: usize = (0..5)
            .map(|_| source.emit(DeviceMotionReading::new(0.0, 0.0, 9.81)))
            .sum();

        assert_eq!(delivered, 2);
        assert!(handle.try_next_sample().is_some());
        assert!(handle.try_next_sample().is_some());
        assert!(handle.try_next_sample().is_none());
    }
}
