//! Logical disk access as a client-facing capability (`disk_read`/
//! `disk_write`), wrapping the read and write drivers with the event
//! manager and device serial a caller expects every device operation to
//! report through.
//!
//! Modeled as its own handle rather than a method pair on [`Device`]:
//! nothing in this workspace unifies the framed-message transport and the
//! block-disk protocol round-trip into one concrete object, so a
//! `ReadDriver`/`WriteDriver` pair is taken as given, the way a concrete
//! device implementation would hand over two already-wired drivers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use viface_disk::{write_logical_disk, ReadDriver, WriteDriver};
use viface_events::{DeviceSerial, EventManager};

/// A logical disk reachable through a read driver and a write driver
/// sharing one device's event ring.
pub struct DiskDevice<R: ReadDriver, W: WriteDriver> {
    read: Mutex<R>,
    write: Mutex<W>,
    events: Arc<EventManager>,
    serial: Option<DeviceSerial>,
}

impl<R: ReadDriver, W: WriteDriver> DiskDevice<R, W> {
    pub fn new(
        read: R,
        write: W,
        events: Arc<EventManager>,
        serial: Option<DeviceSerial>,
    ) -> Self {
        Self {
            read: Mutex::new(read),
            write: Mutex::new(write),
            events,
            serial,
        }
    }

    /// Read `amount` bytes starting at logical position `pos`.
    pub fn disk_read(
        &self,
        pos: u64,
        into: &mut [u8],
        amount: u64,
        timeout: Duration,
    ) -> Option<u64> {
        let mut read = self.read.lock().unwrap();
        let events = &self.events;
        let serial = self.serial;
        read.read_logical_disk(pos, into, amount, timeout, &mut |kind, severity| {
            events.add(kind, severity, serial)
        })
    }

    /// Write `from` starting at logical position `pos`, reading back each
    /// affected block first so partial-block writes don't clobber
    /// neighboring bytes.
    pub fn disk_write(&self, pos: u64, from: &[u8], amount: u64, timeout: Duration) -> Option<u64> {
        let mut read = self.read.lock().unwrap();
        let mut write = self.write.lock().unwrap();
        let events = &self.events;
        let serial = self.serial;
        write_logical_disk(
            &mut *write,
            &mut *read,
            pos,
            from,
            amount,
            timeout,
            &mut |kind, severity| events.add(kind, severity, serial),
        )
    }
}
