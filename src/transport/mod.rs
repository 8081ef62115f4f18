//! Transport layer for byte-source abstraction

use crate::error::Result;

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Byte-source trait for sensor communication
///
/// `read` returning `Ok(0)` is the timeout sentinel ("no byte available
/// yet"); an explicitly closed or disconnected source surfaces as
/// [`crate::Error::Disconnected`]. Callers rely on this split: timeouts are
/// retried in place, disconnects are fatal for the current reader task.
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 = timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0) // Default implementation
    }
}
