//! Frame synchronization
//!
//! Locates the sync marker in an unbounded byte stream. The marker may be
//! preceded by arbitrary garbage, including strict prefixes of the marker
//! itself, so a failed partial match must re-evaluate the breaking byte
//! rather than discard it.
//!
//! Known protocol weakness: the wire format carries no checksum or length
//! field, so a marker-valued byte sequence inside payload data causes an
//! undetected spurious resync. The desync counter is the only signal.

use crate::error::Result;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};

/// Byte-at-a-time marker matcher.
///
/// Tracks how many leading marker bytes have matched so far. Feeding the
/// byte that completes the marker returns `true` and resets the matcher
/// for the next frame.
pub struct SyncMatcher {
    marker: Vec<u8>,
    progress: usize,
}

impl SyncMatcher {
    /// Create a matcher for the given marker (must be non-empty)
    pub fn new(marker: &[u8]) -> Self {
        debug_assert!(!marker.is_empty());
        Self {
            marker: marker.to_vec(),
            progress: 0,
        }
    }

    /// Marker length in bytes
    pub fn marker_len(&self) -> usize {
        self.marker.len()
    }

    /// Feed one byte; returns `true` when the marker has just completed
    pub fn advance(&mut self, byte: u8) -> bool {
        if byte == self.marker[self.progress] {
            self.progress += 1;
            if self.progress == self.marker.len() {
                self.progress = 0;
                return true;
            }
        } else if self.progress > 0 {
            // The byte that broke a partial match may itself start the
            // marker; re-evaluate it against marker[0] instead of
            // dropping it.
            self.progress = usize::from(byte == self.marker[0]);
        }
        false
    }

    /// Forget any partial match
    pub fn reset(&mut self) {
        self.progress = 0;
    }
}

/// Result of a marker scan
#[derive(Debug)]
pub enum ScanOutcome {
    /// Marker matched; `discarded` bytes were consumed before it started
    Synced { discarded: usize },
    /// Read budget ran out before the marker appeared
    BudgetExhausted { scanned: usize },
    /// The stop flag was raised mid-scan
    Stopped,
}

/// Scan the transport until the marker is fully matched.
///
/// With `budget = Some(n)` at most `n` read attempts are made, where a
/// timeout poll counts as one attempt, so a silent line exhausts the
/// budget too. With `budget = None` the scan runs until marker, stop, or
/// transport error.
pub fn scan_for_marker(
    transport: &mut dyn Transport,
    matcher: &mut SyncMatcher,
    budget: Option<usize>,
    stop: &AtomicBool,
) -> Result<ScanOutcome> {
    matcher.reset();
    let mut attempts = 0usize;
    let mut consumed = 0usize;
    let mut byte = [0u8; 1];

    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(ScanOutcome::Stopped);
        }
        if let Some(limit) = budget {
            if attempts >= limit {
                return Ok(ScanOutcome::BudgetExhausted { scanned: attempts });
            }
        }
        attempts += 1;

        let n = transport.read(&mut byte)?;
        if n == 0 {
            continue; // timeout sentinel; nothing consumed
        }
        consumed += 1;

        if matcher.advance(byte[0]) {
            return Ok(ScanOutcome::Synced {
                discarded: consumed - matcher.marker_len(),
            });
        }
    }
}
