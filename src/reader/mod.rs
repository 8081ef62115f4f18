//! IMU telemetry reader
//!
//! [`ImuReader`] owns the byte source and the decode thread, and is the
//! only writer to the shared frame store. Consumers take snapshots with
//! [`ImuReader::latest_frame`] or drain a subscription channel; neither
//! can observe a partially decoded frame.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected → Opening → Syncing → Decoding → Published
//!                              ↑__________________|
//! ```
//!
//! `Faulted` is reachable from any step on unrecoverable I/O failure;
//! `Stopped` via cooperative cancellation. Both are terminal for the task
//! instance; an explicit `start()` begins a fresh one.

mod task;

use crate::config::SensorConfig;
use crate::error::{Error, Result};
use crate::frame::TelemetryFrame;
use crate::store::{FrameReceiver, FrameStore, ReaderStats};
use crate::sync::{scan_for_marker, ScanOutcome, SyncMatcher};
use crate::transport::{SerialTransport, Transport};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Reader task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReaderState {
    /// No task has run yet
    Disconnected = 0,
    /// Opening the byte source
    Opening = 1,
    /// Scanning for the sync marker
    Syncing = 2,
    /// Accumulating a frame payload
    Decoding = 3,
    /// A frame was just made visible (transient; yields to Syncing)
    Published = 4,
    /// Unrecoverable I/O failure; requires a new `start()`
    Faulted = 5,
    /// Cooperatively cancelled
    Stopped = 6,
}

impl ReaderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ReaderState::Opening,
            2 => ReaderState::Syncing,
            3 => ReaderState::Decoding,
            4 => ReaderState::Published,
            5 => ReaderState::Faulted,
            6 => ReaderState::Stopped,
            _ => ReaderState::Disconnected,
        }
    }

    /// True for `Faulted` and `Stopped`
    pub fn is_terminal(self) -> bool {
        matches!(self, ReaderState::Faulted | ReaderState::Stopped)
    }
}

/// Owner of the byte source and the decode thread.
///
/// Restartable: `start()` while a prior task is live first stops and joins
/// it, so two tasks never share the source.
pub struct ImuReader {
    config: SensorConfig,
    store: Arc<FrameStore>,
    state: Arc<AtomicU8>,
    shutdown: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
}

impl ImuReader {
    /// Create a reader for the given sensor configuration
    pub fn new(config: SensorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: Arc::new(FrameStore::new()),
            state: Arc::new(AtomicU8::new(ReaderState::Disconnected as u8)),
            shutdown: Arc::new(AtomicBool::new(false)),
            reader_handle: None,
        })
    }

    /// Open the configured serial port and start reading.
    ///
    /// Blocks through the initial bounded marker scan so a sensor that
    /// never synchronizes is reported here as [`Error::SyncTimeout`]
    /// rather than as a background fault. On success the decode thread is
    /// running when this returns.
    pub fn start(&mut self) -> Result<()> {
        let transport = SerialTransport::open(
            &self.config.port,
            self.config.baud_rate,
            Duration::from_millis(self.config.read_timeout_ms),
        )
        .map_err(|e| {
            self.set_state(ReaderState::Faulted);
            e
        })?;
        self.start_with_transport(transport)
    }

    /// Start reading from an already-open transport (tests, demos).
    pub fn start_with_transport<T: Transport + 'static>(&mut self, transport: T) -> Result<()> {
        // A live prior task must release the source before a new one
        // may own it.
        self.stop();
        self.shutdown.store(false, Ordering::Relaxed);

        let mut transport: Box<dyn Transport> = Box::new(transport);
        self.set_state(ReaderState::Opening);

        if let Some(request) = &self.config.stream_request {
            if let Err(e) = transport.write(request).and_then(|_| transport.flush()) {
                log::error!("Stream request write failed: {}", e);
                self.set_state(ReaderState::Faulted);
                return Err(e);
            }
            log::debug!("Wrote {}-byte stream request", request.len());
        }

        self.set_state(ReaderState::Syncing);
        let mut matcher = SyncMatcher::new(&self.config.marker);
        let budget = self.config.sync_budget();
        match scan_for_marker(&mut *transport, &mut matcher, Some(budget), &self.shutdown) {
            Ok(ScanOutcome::Synced { discarded }) => {
                self.store.record_discard(discarded as u64);
                if discarded > 0 {
                    log::debug!("Skipped {} bytes before first marker", discarded);
                }
            }
            Ok(ScanOutcome::BudgetExhausted { scanned }) => {
                log::error!("No sync marker within {} byte reads", scanned);
                self.set_state(ReaderState::Faulted);
                return Err(Error::SyncTimeout { scanned });
            }
            Ok(ScanOutcome::Stopped) => {
                self.set_state(ReaderState::Stopped);
                return Ok(());
            }
            Err(e) => {
                log::error!("Initial sync failed: {}", e);
                self.set_state(ReaderState::Faulted);
                return Err(e);
            }
        }

        let task_config = task::TaskConfig {
            marker: self.config.marker.clone(),
            channel_count: self.config.channel_count,
        };
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let shutdown = Arc::clone(&self.shutdown);

        self.reader_handle = Some(
            thread::Builder::new()
                .name("imu-reader".to_string())
                .spawn(move || {
                    task::reader_loop(transport, task_config, store, state, shutdown);
                })
                .map_err(|e| Error::Other(format!("Failed to spawn reader thread: {}", e)))?,
        );

        log::info!(
            "Reader started ({} channels, {}-byte marker)",
            self.config.channel_count,
            self.config.marker.len()
        );
        Ok(())
    }

    /// Request a cooperative stop and wait for the task to exit.
    ///
    /// No-op on an already-stopped (or never-started) reader. A task that
    /// already ended in `Faulted` keeps that state; otherwise the state
    /// is `Stopped` once this returns.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader_handle.take() {
            if handle.join().is_err() {
                log::error!("Reader thread panicked");
            }
            if self.state() != ReaderState::Faulted {
                self.set_state(ReaderState::Stopped);
            }
            log::info!("Reader stopped");
        }
    }

    /// Current lifecycle state (lockless read)
    pub fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Snapshot of the newest complete frame.
    ///
    /// Returns the last good frame during a fault (staleness, not an
    /// error); `None` before the first publish.
    pub fn latest_frame(&self) -> Option<TelemetryFrame> {
        self.store.latest()
    }

    /// Register a subscriber channel fed once per published frame
    pub fn subscribe(&self) -> FrameReceiver {
        self.store.subscribe()
    }

    /// Observability counters for this reader
    pub fn stats(&self) -> ReaderStats {
        self.store.stats()
    }

    fn set_state(&self, value: ReaderState) {
        self.state.store(value as u8, Ordering::Relaxed);
    }
}

impl Drop for ImuReader {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const MARKER: [u8; 4] = [0x7F, 0x80, 0x00, 0x00];

    fn test_config() -> SensorConfig {
        SensorConfig {
            marker: MARKER.to_vec(),
            ..SensorConfig::razor_defaults()
        }
    }

    fn encode(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn wait_for_state(reader: &ImuReader, target: ReaderState) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while reader.state() != target {
            assert!(
                std::time::Instant::now() < deadline,
                "timed out waiting for {:?}, state is {:?}",
                target,
                reader.state()
            );
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_single_frame_decodes_and_publishes() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&values));
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(mock).unwrap();

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.channels(), values.as_slice());
        assert_eq!(frame.generation(), 1);

        // The closed source then faults the resync; the last good frame
        // stays visible.
        wait_for_state(&reader, ReaderState::Faulted);
        assert_eq!(reader.latest_frame().unwrap().channels(), values.as_slice());
    }

    #[test]
    fn test_garbage_prefix_tolerated() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let mock = MockTransport::new();
        mock.inject_read(&[0x7F, 0x80, 0xAA]); // strict marker prefix, then a break
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&values));
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(mock).unwrap();

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.channels(), values.as_slice());
        assert_eq!(reader.stats().bytes_discarded, 3);
    }

    #[test]
    fn test_truncated_stream_faults_without_publishing() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let wire = encode(&values);
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&wire[..20]); // 20 of 36 payload bytes
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        reader.start_with_transport(mock).unwrap();

        wait_for_state(&reader, ReaderState::Faulted);
        assert!(reader.latest_frame().is_none());
        assert_eq!(reader.stats().frames_published, 0);
    }

    #[test]
    fn test_sync_timeout_reported_to_caller() {
        let mock = MockTransport::new();
        mock.inject_read(&[0x01, 0x02, 0x03]); // never a marker

        let mut reader = ImuReader::new(test_config()).unwrap();
        let err = reader.start_with_transport(mock).unwrap_err();
        assert!(matches!(err, Error::SyncTimeout { .. }));
        assert_eq!(reader.state(), ReaderState::Faulted);
        assert!(reader.latest_frame().is_none());
    }

    #[test]
    fn test_open_disconnect_faults_start() {
        let mock = MockTransport::new();
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        let err = reader.start_with_transport(mock).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert_eq!(reader.state(), ReaderState::Faulted);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&values));
        // Source stays open: the task idles in resync timeouts until stopped.

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(mock).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        reader.stop();
        assert_eq!(reader.state(), ReaderState::Stopped);
        reader.stop(); // no-op, returns promptly
        assert_eq!(reader.state(), ReaderState::Stopped);
    }

    #[test]
    fn test_restart_after_stop() {
        let first = MockTransport::new();
        first.inject_read(&MARKER);
        first.inject_read(&encode(&[1.0; 9]));

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(first).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        reader.stop();

        let second = MockTransport::new();
        second.inject_read(&MARKER);
        second.inject_read(&encode(&[2.0; 9]));
        reader.start_with_transport(second).unwrap();

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.channels(), &[2.0; 9]);
        assert_eq!(frame.generation(), 2);
    }

    #[test]
    fn test_start_while_running_stops_prior_task() {
        let first = MockTransport::new();
        first.inject_read(&MARKER);
        first.inject_read(&encode(&[1.0; 9]));
        // First task then idles, still running.

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(first).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let second = MockTransport::new();
        second.inject_read(&MARKER);
        second.inject_read(&encode(&[2.0; 9]));
        second.close();

        // No explicit stop(): start() must stop and join the prior task
        // before the new one owns a source.
        reader.start_with_transport(second).unwrap();
        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.channels(), &[2.0; 9]);
    }

    #[test]
    fn test_desync_recovery_between_frames() {
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&[1.0; 9]));
        mock.inject_read(&[0xDE, 0xAD, 0xBE]); // stray bytes where a marker belongs
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&[2.0; 9]));
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(mock).unwrap();

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().channels(),
            &[1.0; 9]
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().channels(),
            &[2.0; 9]
        );

        wait_for_state(&reader, ReaderState::Faulted);
        let stats = reader.stats();
        assert_eq!(stats.desyncs, 1);
        assert_eq!(stats.bytes_discarded, 3);
        assert_eq!(stats.frames_published, 2);
    }

    #[test]
    fn test_channel_error_aborts_frame_and_resyncs() {
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&[0u8; 10]); // partial payload
        mock.inject_error(std::io::ErrorKind::InvalidData);
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&[3.0; 9]));
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(mock).unwrap();

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.channels(), &[3.0; 9]);
        assert_eq!(frame.generation(), 1); // the aborted frame never published

        wait_for_state(&reader, ReaderState::Faulted);
        let stats = reader.stats();
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.frames_published, 1);
        // The 10 partial payload bytes were consumed by the aborted
        // decode, not the resync scan.
        assert_eq!(stats.desyncs, 0);
    }

    #[test]
    fn test_stream_request_written_on_open() {
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&[0.0; 9]));
        mock.close();

        let mut config = test_config();
        config.stream_request = Some(b"#s12".to_vec());

        let mut reader = ImuReader::new(config).unwrap();
        let probe = mock.clone();
        reader.start_with_transport(mock).unwrap();
        assert_eq!(probe.get_written(), b"#s12");
    }

    #[test]
    fn test_snapshots_never_mix_decode_cycles() {
        // Every channel of frame n carries the value n; a torn snapshot
        // would mix values from two generations.
        let frame_count = 200u64;
        let mock = MockTransport::new();
        for n in 1..=frame_count {
            mock.inject_read(&MARKER);
            mock.inject_read(&encode(&[n as f32; 9]));
        }
        mock.close();

        let mut reader = ImuReader::new(test_config()).unwrap();
        reader.start_with_transport(mock).unwrap();

        let mut last_generation = 0u64;
        while reader.state() != ReaderState::Faulted {
            if let Some(frame) = reader.latest_frame() {
                let first = frame.channels()[0];
                assert!(frame.channels().iter().all(|&c| c == first));
                assert!(frame.generation() >= last_generation);
                last_generation = frame.generation();
            }
        }
        assert_eq!(reader.stats().frames_published, frame_count);
    }

    #[test]
    fn test_twelve_channel_frames() {
        let values: Vec<f32> = (1..=12).map(|v| v as f32).collect();
        let mock = MockTransport::new();
        mock.inject_read(&MARKER);
        mock.inject_read(&encode(&values));
        mock.close();

        let mut config = test_config();
        config.channel_count = 12;

        let mut reader = ImuReader::new(config).unwrap();
        let rx = reader.subscribe();
        reader.start_with_transport(mock).unwrap();

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.orientation(), Some([10.0, 11.0, 12.0]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.marker = Vec::new();
        assert!(matches!(ImuReader::new(config), Err(Error::Config(_))));

        let mut config = test_config();
        config.channel_count = 0;
        assert!(matches!(ImuReader::new(config), Err(Error::Config(_))));
    }
}
