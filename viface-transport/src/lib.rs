//! The driver contract: the capability surface every concrete transport
//! (USB/FTDI, raw Ethernet, POSIX shared memory) must provide,
//! independent of how bytes actually move.
//!
//! A concrete driver owns no threads itself; [`viface-comm`](../viface_comm)
//! spawns the reader/writer tasks and calls into a `Driver` from them.
//! This crate defines only the contract plus a [`loopback::LoopbackDriver`]
//! used by the test suite — real FTDI/PCAP/FirmIO implementations are out
//! of scope.

pub mod loopback;

use viface_events::DeviceSerial;

/// A device this driver's `find` discovered but has not opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundDevice {
    pub name: String,
    pub serial: Option<DeviceSerial>,
}

/// Fatal, non-recoverable transport failure. Distinct from the
/// operational-failure events reported through [`viface_events`]: this is
/// the signal that tells [`viface-comm`](../viface_comm) to stop calling
/// into the driver and tear the device down.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("the transport disconnected")]
    Disconnected,
}

/// Capability surface a transport must provide.
///
/// `read` is the reader task's only blocking point: it returns whatever
/// bytes are currently available (possibly empty, on a non-fatal poll
/// timeout) or `Err(DriverError::Disconnected)` once the transport is
/// gone for good. `write_internal` is the writer task's only blocking
/// point.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait Driver: Send {
    /// Open the underlying transport. Returns `false` on failure; the
    /// caller reports `DriverFailedToOpen`.
    fn open(&mut self) -> bool;
    /// Close the underlying transport. Returns `false` on failure; the
    /// caller reports `DriverFailedToClose`.
    fn close(&mut self) -> bool;
    fn is_open(&self) -> bool;

    /// Block until at least one byte is available or the poll interval
    /// elapses, returning whatever arrived.
    fn read(&mut self) -> Result<Vec<u8>, DriverError>;

    /// Whether the outbound queue is completely full (callers must wait).
    fn write_queue_full(&self) -> bool;
    /// Whether the outbound queue is close to full (callers may start
    /// slowing down).
    fn write_queue_almost_full(&self) -> bool;
    /// Synchronous blocking write. Returns `false` on failure; the caller
    /// reports `FailedToWrite`.
    fn write_internal(&mut self, bytes: &[u8]) -> bool;
}
