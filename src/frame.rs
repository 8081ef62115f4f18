//! Telemetry frame type

/// Channels in a base frame: accel XYZ, magnetometer XYZ, gyro XYZ
pub const CHANNELS_BASE: usize = 9;

/// Channels in an extended frame: base plus yaw/pitch/roll
pub const CHANNELS_WITH_ORIENTATION: usize = 12;

/// Bytes per wire channel (little-endian IEEE-754 binary32)
pub const BYTES_PER_CHANNEL: usize = 4;

/// One complete marker-delimited sensor transmission.
///
/// Channel semantics are fixed by position: 0-2 acceleration XYZ,
/// 3-5 magnetometer XYZ, 6-8 gyroscope XYZ, optional 9-11 yaw/pitch/roll.
/// A frame is immutable once built; every channel belongs to the same
/// decode cycle, witnessed by the `generation` counter.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    generation: u64,
    timestamp_us: u64,
    channels: Vec<f32>,
}

impl TelemetryFrame {
    /// Build a frame from a fully decoded channel set, stamped now
    pub(crate) fn new(generation: u64, channels: Vec<f32>) -> Self {
        let timestamp_us = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            generation,
            timestamp_us,
            channels,
        }
    }

    /// Publish sequence number; increases by one per decoded frame
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wall-clock publish time in microseconds since the Unix epoch
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// All channels in wire order
    pub fn channels(&self) -> &[f32] {
        &self.channels
    }

    /// Single channel by wire position
    pub fn channel(&self, index: usize) -> Option<f32> {
        self.channels.get(index).copied()
    }

    fn triple(&self, start: usize) -> Option<[f32; 3]> {
        if self.channels.len() >= start + 3 {
            Some([
                self.channels[start],
                self.channels[start + 1],
                self.channels[start + 2],
            ])
        } else {
            None
        }
    }

    /// Accelerometer XYZ, if the frame carries at least 3 channels
    pub fn accel(&self) -> Option<[f32; 3]> {
        self.triple(0)
    }

    /// Magnetometer XYZ, if the frame carries at least 6 channels
    pub fn mag(&self) -> Option<[f32; 3]> {
        self.triple(3)
    }

    /// Gyroscope XYZ, if the frame carries at least 9 channels
    pub fn gyro(&self) -> Option<[f32; 3]> {
        self.triple(6)
    }

    /// Yaw/pitch/roll, only present on extended 12-channel frames
    pub fn orientation(&self) -> Option<[f32; 3]> {
        self.triple(9)
    }

    /// Accelerometer vector magnitude
    pub fn accel_magnitude(&self) -> Option<f32> {
        self.accel()
            .map(|[x, y, z]| (x.powi(2) + y.powi(2) + z.powi(2)).sqrt())
    }
}
