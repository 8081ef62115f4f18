//! Shared telemetry state and publish fan-out
//!
//! Holds the newest complete frame for arbitrary concurrent readers.
//! Frames are built fully off to the side and swapped into the slot
//! wholesale, so a reader can never observe channels from two different
//! decode cycles. Subscribers get their own bounded channel; a slow
//! subscriber loses frames rather than stalling sensor ingestion.

use crate::frame::TelemetryFrame;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-subscriber channel capacity (~1s of frames at the 50Hz default
/// transmission rate)
pub const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;

/// Receiving half handed to a subscriber
pub type FrameReceiver = Receiver<TelemetryFrame>;

/// Counters exposed for observability; all monotonically increasing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Frames decoded and made visible to consumers
    pub frames_published: u64,
    /// Mid-stream resyncs (stray bytes found where a marker was expected)
    pub desyncs: u64,
    /// Total bytes skipped while scanning for markers
    pub bytes_discarded: u64,
    /// Frames aborted on an explicit channel read error
    pub decode_errors: u64,
    /// Frames not delivered to a subscriber whose channel was full
    pub frames_dropped: u64,
}

/// Latest-frame slot plus subscriber registry.
///
/// Written only by the reader task; read by any number of consumers.
pub struct FrameStore {
    latest: Mutex<Option<TelemetryFrame>>,
    subscribers: Mutex<Vec<Sender<TelemetryFrame>>>,
    next_generation: AtomicU64,
    frames_published: AtomicU64,
    desyncs: AtomicU64,
    bytes_discarded: AtomicU64,
    decode_errors: AtomicU64,
    frames_dropped: AtomicU64,
}

impl FrameStore {
    /// Create an empty store (no frame published yet)
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_generation: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            desyncs: AtomicU64::new(0),
            bytes_discarded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Publish a fully decoded channel set as the newest frame.
    ///
    /// The slot is replaced in one exclusive operation, then subscribers
    /// are notified with `try_send`: a full channel drops the frame for
    /// that subscriber, a disconnected one is pruned. Returns the frame's
    /// generation number.
    pub fn publish(&self, channels: Vec<f32>) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = TelemetryFrame::new(generation, channels);

        *self.latest.lock() = Some(frame.clone());
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        generation
    }

    /// Snapshot of the newest frame, `None` before the first publish.
    ///
    /// The returned frame is an owned copy; the reader task can never
    /// mutate it after the fact.
    pub fn latest(&self) -> Option<TelemetryFrame> {
        self.latest.lock().clone()
    }

    /// Register a subscriber; every future publish is offered to it
    pub fn subscribe(&self) -> FrameReceiver {
        let (tx, rx) = bounded(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Record bytes skipped during the initial (open-time) scan
    pub fn record_discard(&self, bytes: u64) {
        if bytes > 0 {
            self.bytes_discarded.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    /// Record a mid-stream desync and the bytes lost to it
    pub fn record_desync(&self, bytes: u64) {
        self.desyncs.fetch_add(1, Ordering::Relaxed);
        self.bytes_discarded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a frame aborted on an explicit channel read error
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            desyncs: self.desyncs.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_starts_empty() {
        let store = FrameStore::new();
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let store = FrameStore::new();
        store.publish(vec![1.0; 9]);
        store.publish(vec![2.0; 9]);

        let frame = store.latest().unwrap();
        assert_eq!(frame.channels(), &[2.0; 9]);
        assert_eq!(frame.generation(), 2);
        assert_eq!(store.stats().frames_published, 2);
    }

    #[test]
    fn test_snapshot_is_stable_across_publishes() {
        let store = FrameStore::new();
        store.publish(vec![1.0; 9]);
        let snapshot = store.latest().unwrap();
        store.publish(vec![2.0; 9]);
        assert_eq!(snapshot.channels(), &[1.0; 9]);
    }

    #[test]
    fn test_subscriber_receives_frames_in_order() {
        let store = FrameStore::new();
        let rx = store.subscribe();
        store.publish(vec![1.0; 9]);
        store.publish(vec![2.0; 9]);

        assert_eq!(rx.recv().unwrap().generation(), 1);
        assert_eq!(rx.recv().unwrap().generation(), 2);
    }

    #[test]
    fn test_slow_subscriber_never_blocks_publish() {
        let store = FrameStore::new();
        let rx = store.subscribe();

        for n in 0..(SUBSCRIBER_CHANNEL_CAPACITY as u64 + 10) {
            store.publish(vec![n as f32; 9]);
        }

        let stats = store.stats();
        assert_eq!(stats.frames_dropped, 10);
        assert_eq!(
            stats.frames_published,
            SUBSCRIBER_CHANNEL_CAPACITY as u64 + 10
        );
        // Latest still reflects the newest frame even though the
        // subscriber fell behind.
        assert_eq!(
            store.latest().unwrap().generation(),
            SUBSCRIBER_CHANNEL_CAPACITY as u64 + 10
        );
        assert_eq!(rx.len(), SUBSCRIBER_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_disconnected_subscriber_pruned() {
        let store = FrameStore::new();
        let rx = store.subscribe();
        drop(rx);
        store.publish(vec![0.0; 9]);
        assert_eq!(store.subscribers.lock().len(), 0);
    }

    #[test]
    fn test_desync_counters() {
        let store = FrameStore::new();
        store.record_desync(5);
        store.record_discard(3);
        store.record_decode_error();

        let stats = store.stats();
        assert_eq!(stats.desyncs, 1);
        assert_eq!(stats.bytes_discarded, 8);
        assert_eq!(stats.decode_errors, 1);
    }
}
