//! PravahaIO - Serial telemetry acquisition for 9-axis IMU sensors
//!
//! Ingests the sensor's binary frame stream over a serial link on a
//! dedicated reader thread and exposes the most recently decoded frame to
//! any number of consumers, with no partially-written frame ever visible.
//!
//! - [`transport`]: byte-source abstraction (real serial port or mock)
//! - [`sync`] / [`decode`]: marker scanning and payload decoding
//! - [`store`]: shared latest-frame slot and subscriber fan-out
//! - [`reader`]: the reader task and its lifecycle state machine

pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod reader;
pub mod store;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use config::{AppConfig, SensorConfig};
pub use error::{Error, Result};
pub use frame::TelemetryFrame;
pub use reader::{ImuReader, ReaderState};
pub use store::{FrameReceiver, ReaderStats};
pub use transport::{MockTransport, SerialTransport, Transport};
