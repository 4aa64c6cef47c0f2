//! An in-memory driver that hands back whatever was written to it,
//! used by `viface-comm`'s tests in place of real hardware.

use std::collections::VecDeque;
use std::time::Duration;

use crate::{Driver, DriverError};

/// Queue depth at which [`LoopbackDriver::write_queue_almost_full`] starts
/// reporting true, matching the backpressure contract any real driver
/// must honor.
const ALMOST_FULL_THRESHOLD: usize = 8;
const FULL_THRESHOLD: usize = 16;

/// Loops written bytes back as read bytes, one write per read call.
///
/// Useful for exercising `viface-comm`'s framing and dispatch logic
/// end-to-end without a real transport underneath.
pub struct LoopbackDriver {
    open: bool,
    pending: VecDeque<Vec<u8>>,
    poll_interval: Duration,
}

impl LoopbackDriver {
    pub fn new() -> Self {
        Self {
            open: false,
            pending: VecDeque::new(),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Inject bytes as if they arrived from the far end, for tests that
    /// want to drive the reader path without a matching writer.
    pub fn inject(&mut self, bytes: Vec<u8>) {
        self.pending.push_back(bytes);
    }
}

impl Default for LoopbackDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for LoopbackDriver {
    fn open(&mut self) -> bool {
        self.open = true;
        true
    }

    fn close(&mut self) -> bool {
        self.open = false;
        true
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self) -> Result<Vec<u8>, DriverError> {
        if !self.open {
            return Err(DriverError::Disconnected);
        }
        match self.pending.pop_front() {
            Some(bytes) => Ok(bytes),
            None => {
                std::thread::sleep(self.poll_interval);
                Ok(Vec::new())
            }
        }
    }

    fn write_queue_full(&self) -> bool {
        self.pending.len() >= FULL_THRESHOLD
    }

    fn write_queue_almost_full(&self) -> bool {
        self.pending.len() >= ALMOST_FULL_THRESHOLD
    }

    fn write_internal(&mut self, bytes: &[u8]) -> bool {
        if !self.open {
            return false;
        }
        self.pending.push_back(bytes.to_vec());
        true
    }
}
