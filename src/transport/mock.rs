//! Mock transport for testing

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One scripted read event. Data segments drain across multiple reads;
/// timeout and error segments fire exactly once.
enum Segment {
    Data(VecDeque<u8>),
    Timeout,
    Error(std::io::ErrorKind),
}

struct MockTransportInner {
    segments: VecDeque<Segment>,
    write_buffer: Vec<u8>,
    closed: bool,
}

/// Mock transport for unit testing
///
/// Reads drain injected segments in order. An empty script yields the
/// timeout sentinel (`Ok(0)`) until [`MockTransport::close`] is called,
/// after which reads return [`Error::Disconnected`].
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                segments: VecDeque::new(),
                write_buffer: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        inner
            .segments
            .push_back(Segment::Data(data.iter().copied().collect()));
    }

    /// Inject a single timeout (`Ok(0)`) between data segments
    pub fn inject_timeout(&self) {
        self.inner.lock().segments.push_back(Segment::Timeout);
    }

    /// Inject a one-shot read error
    pub fn inject_error(&self, kind: std::io::ErrorKind) {
        self.inner.lock().segments.push_back(Segment::Error(kind));
    }

    /// Mark the source closed; reads fail once the script is drained
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();

        match inner.segments.pop_front() {
            Some(Segment::Data(mut bytes)) => {
                let available = bytes.len().min(buffer.len());
                for item in buffer.iter_mut().take(available) {
                    if let Some(b) = bytes.pop_front() {
                        *item = b;
                    }
                }
                if !bytes.is_empty() {
                    inner.segments.push_front(Segment::Data(bytes));
                }
                Ok(available)
            }
            Some(Segment::Timeout) => Ok(0),
            Some(Segment::Error(kind)) => Err(Error::Io(std::io::Error::from(kind))),
            None if inner.closed => Err(Error::Disconnected),
            None => {
                drop(inner);
                // Pace like a real port read timeout instead of letting
                // callers spin.
                std::thread::sleep(std::time::Duration::from_millis(1));
                Ok(0)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Disconnected);
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        let inner = self.inner.lock();
        let pending = inner
            .segments
            .iter()
            .map(|s| match s {
                Segment::Data(bytes) => bytes.len(),
                _ => 0,
            })
            .sum();
        Ok(pending)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
