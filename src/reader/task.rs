//! Reader thread for the IMU telemetry stream
//!
//! Runs the decode → publish → resync loop on a dedicated OS thread. The
//! thread enters with the stream positioned just past an already-matched
//! marker (the initial bounded scan happens in [`super::ImuReader::start`]),
//! so each iteration decodes one payload, publishes it, then scans for the
//! next marker.
//!
//! # Error routing
//!
//! - Disconnect (port closed/unplugged): fatal for this task instance;
//!   state goes to `Faulted`, the in-progress frame is discarded.
//! - Explicit channel read error: the frame is aborted and the loop falls
//!   through to resync; never surfaces to the owning application.
//! - Timeout: absorbed inside the decode/scan primitives.
//! - Stray bytes before a marker after the first frame: counted as a
//!   desync, otherwise silent.

use crate::decode::{read_frame_payload, DecodeOutcome};
use crate::error::Error;
use crate::store::FrameStore;
use crate::sync::{scan_for_marker, ScanOutcome, SyncMatcher};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use super::ReaderState;

/// Wire parameters the task needs from the sensor config
pub(super) struct TaskConfig {
    pub marker: Vec<u8>,
    pub channel_count: usize,
}

fn set_state(state: &AtomicU8, value: ReaderState) {
    state.store(value as u8, Ordering::Relaxed);
}

/// Reader loop - decodes frames and updates shared state until stopped
pub(super) fn reader_loop(
    mut transport: Box<dyn Transport>,
    config: TaskConfig,
    store: Arc<FrameStore>,
    state: Arc<AtomicU8>,
    shutdown: Arc<AtomicBool>,
) {
    let mut matcher = SyncMatcher::new(&config.marker);

    'run: loop {
        if shutdown.load(Ordering::Relaxed) {
            set_state(&state, ReaderState::Stopped);
            break;
        }

        set_state(&state, ReaderState::Decoding);
        match read_frame_payload(&mut *transport, config.channel_count, &shutdown) {
            Ok(DecodeOutcome::Frame(channels)) => {
                let generation = store.publish(channels);
                set_state(&state, ReaderState::Published);
                log::debug!("Published frame generation {}", generation);
            }
            Ok(DecodeOutcome::Stopped) => {
                set_state(&state, ReaderState::Stopped);
                break;
            }
            Err(Error::Disconnected) => {
                log::error!("Byte source disconnected mid-frame");
                set_state(&state, ReaderState::Faulted);
                break;
            }
            Err(e) => {
                log::warn!("Frame aborted on channel error: {}", e);
                store.record_decode_error();
            }
        }

        set_state(&state, ReaderState::Syncing);
        loop {
            match scan_for_marker(&mut *transport, &mut matcher, None, &shutdown) {
                Ok(ScanOutcome::Synced { discarded }) => {
                    if discarded > 0 {
                        log::warn!("Resynchronized after {} stray bytes", discarded);
                        store.record_desync(discarded as u64);
                    }
                    break;
                }
                Ok(ScanOutcome::Stopped) => {
                    set_state(&state, ReaderState::Stopped);
                    break 'run;
                }
                Ok(ScanOutcome::BudgetExhausted { scanned }) => {
                    // In-stream scans run unbounded; this arm cannot fire.
                    log::error!("Unbounded scan reported exhaustion at {}", scanned);
                    set_state(&state, ReaderState::Faulted);
                    break 'run;
                }
                Err(Error::Disconnected) => {
                    log::error!("Byte source disconnected while scanning");
                    set_state(&state, ReaderState::Faulted);
                    break 'run;
                }
                Err(e) => {
                    log::warn!("Scan read error: {}", e);
                    store.record_decode_error();
                }
            }
        }
    }

    log::info!("Reader thread exiting");
}
