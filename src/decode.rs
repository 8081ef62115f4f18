//! Frame payload decoding
//!
//! Reads the fixed-size payload that follows a matched marker and decodes
//! it into channel values. The payload is `channel_count × 4` bytes, each
//! group of 4 a little-endian IEEE-754 binary32, semantics fixed by
//! position.

use crate::error::Result;
use crate::frame::BYTES_PER_CHANNEL;
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of a payload decode
#[derive(Debug)]
pub enum DecodeOutcome {
    /// All channels assembled from one decode cycle
    Frame(Vec<f32>),
    /// The stop flag was raised mid-frame; nothing is published
    Stopped,
}

/// Read and decode one frame payload.
///
/// Timeout reads (`Ok(0)`) retry in place: a partial frame is never
/// abandoned on a transient timeout, only on an explicit error or
/// disconnect, both of which propagate to the caller with the frame
/// discarded.
pub fn read_frame_payload(
    transport: &mut dyn Transport,
    channel_count: usize,
    stop: &AtomicBool,
) -> Result<DecodeOutcome> {
    let mut payload = vec![0u8; channel_count * BYTES_PER_CHANNEL];
    let mut filled = 0;

    while filled < payload.len() {
        if stop.load(Ordering::Relaxed) {
            return Ok(DecodeOutcome::Stopped);
        }
        let n = transport.read(&mut payload[filled..])?;
        if n == 0 {
            continue; // timeout; keep position and retry
        }
        filled += n;
    }

    let channels = payload
        .chunks_exact(BYTES_PER_CHANNEL)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(DecodeOutcome::Frame(channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::MockTransport;

    fn never() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn encode(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_nine_channels() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let mut mock = MockTransport::new();
        mock.inject_read(&encode(&values));

        match read_frame_payload(&mut mock, 9, &never()).unwrap() {
            DecodeOutcome::Frame(channels) => assert_eq!(channels, values),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_is_little_endian() {
        let mut mock = MockTransport::new();
        mock.inject_read(&[0x00, 0x00, 0x80, 0x3F]); // 1.0f32 LE

        match read_frame_payload(&mut mock, 1, &never()).unwrap() {
            DecodeOutcome::Frame(channels) => assert_eq!(channels, vec![1.0]),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_retries_without_losing_position() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let wire = encode(&values);
        let mut mock = MockTransport::new();
        mock.inject_read(&wire[..20]);
        mock.inject_timeout();
        mock.inject_timeout();
        mock.inject_read(&wire[20..]);

        match read_frame_payload(&mut mock, 9, &never()).unwrap() {
            DecodeOutcome::Frame(channels) => assert_eq!(channels, values),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_disconnect_mid_frame_aborts() {
        let values: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let wire = encode(&values);
        let mut mock = MockTransport::new();
        mock.inject_read(&wire[..20]); // 20 of 36 payload bytes
        mock.close();

        let err = read_frame_payload(&mut mock, 9, &never()).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[test]
    fn test_channel_error_aborts() {
        let mut mock = MockTransport::new();
        mock.inject_read(&[0u8; 10]);
        mock.inject_error(std::io::ErrorKind::InvalidData);

        let err = read_frame_payload(&mut mock, 9, &never()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_stop_mid_frame() {
        let mut mock = MockTransport::new();
        let stop = AtomicBool::new(true);
        let outcome = read_frame_payload(&mut mock, 9, &stop).unwrap();
        assert!(matches!(outcome, DecodeOutcome::Stopped));
    }
}
