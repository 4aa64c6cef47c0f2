//! Client-facing surface: device discovery, open/close/online/offline,
//! message transmit/subscribe, event polling, and logical disk access,
//! wired together from the crates that implement each concern.
//!
//! This crate owns no wire format or transport logic of its own — it is
//! assembly. [`Library`] holds the one [`EventManager`] every device and
//! disk handle reports through; [`Device`] wraps a [`Communication`] with
//! the online/offline gate the API surface describes; [`disk::DiskDevice`]
//! wraps a read/write driver pair for block-level access.

mod disk;

pub use disk::DiskDevice;
pub use viface_codec::{CodecConfig, Message, MAX_CLASSIC_DATA_LEN, MAX_FD_DATA_LEN};
pub use viface_comm::{CommConfig, SubscriptionId};
pub use viface_disk::{
    AlignedWriteOutcome, DiskAccess, DiskTransport, ExtExtractorDiskReadDriver, ReadDriver,
    WriteDriver,
};
pub use viface_events::{
    DeviceSerial, Event, EventFilter, EventManagerConfig, EventType, Severity,
};
pub use viface_netif::Flags as NetworkInterfaceFlags;
pub use viface_transport::{Driver, DriverError, FoundDevice};
pub use viface_wire::{EthernetPacketizerConfig, PacketizerConfig};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use viface_comm::Communication;
use viface_events::EventManager;

/// Process-wide (or at least per-caller) state shared by every open
/// device: chiefly the event manager, since events from every device and
/// from API calls with no device context all flow through one ring set.
pub struct Library {
    events: Arc<EventManager>,
}

impl Library {
    pub fn new(config: EventManagerConfig) -> Self {
        Self {
            events: Arc::new(EventManager::new(config)),
        }
    }

    /// The shared event manager. Exposed directly so a caller can register
    /// its own thread ring, or poll events with no particular device in
    /// mind.
    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// Candidate local network interfaces a raw-Ethernet bridge transport
    /// would probe to discover a device. Concrete device discovery over
    /// USB/FTDI, Ethernet, or shared memory (actually finding and
    /// identifying a responding device on one of these interfaces) is out
    /// of scope here; a concrete transport crate plugs its own `Find()`
    /// into the result of this and [`Self::open_device`].
    pub fn find_devices(&self) -> Vec<FoundDevice> {
        viface_netif::find_broadcast_capable_interfaces()
            .unwrap_or_default()
            .into_iter()
            .map(|(name, _flags)| FoundDevice { name, serial: None })
            .collect()
    }

    /// Wrap an already-constructed driver as an openable [`Device`].
    pub fn open_device<D: Driver + 'static>(
        &self,
        driver: D,
        serial: Option<DeviceSerial>,
        config: CommConfig,
    ) -> Device<D> {
        Device {
            comm: Communication::new(driver, self.events.clone(), serial, config),
            events: self.events.clone(),
            serial,
            online: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// One vehicle-network interface device.
///
/// Opening a device starts its reader/writer tasks but does not put it
/// online; `transmit`/`subscribe` are gated on [`Self::go_online`] having
/// been called, matching the closed/offline/online state machine a real
/// device exposes (`DeviceCurrentlyClosed` vs. `DeviceCurrentlyOffline`
/// are reported for the two distinct reasons a send can be refused).
pub struct Device<D: Driver + 'static> {
    comm: Communication<D>,
    events: Arc<EventManager>,
    serial: Option<DeviceSerial>,
    online: Arc<AtomicBool>,
}

impl<D: Driver + 'static> Device<D> {
    pub fn serial(&self) -> Option<&DeviceSerial> {
        self.serial.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.comm.is_open()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Open the underlying transport and start the reader/writer tasks.
    pub fn open(&mut self) -> bool {
        self.comm.open()
    }

    /// Stop the reader/writer tasks and close the underlying transport.
    /// Also takes the device offline.
    pub fn close(&mut self) -> bool {
        self.online.store(false, Ordering::SeqCst);
        self.comm.close()
    }

    /// Start delivering inbound messages to subscribers and accepting
    /// outbound ones. Fails (and reports `DeviceCurrentlyClosed`) if the
    /// transport isn't open.
    pub fn go_online(&self) -> bool {
        if !self.comm.is_open() {
            self.events
                .add(EventType::DeviceCurrentlyClosed, Severity::Error, self.serial);
            return false;
        }
        self.online.store(true, Ordering::SeqCst);
        true
    }

    /// Stop delivering and accepting messages without closing the
    /// transport.
    pub fn go_offline(&self) -> bool {
        self.online.store(false, Ordering::SeqCst);
        true
    }

    /// Queue `message` for transmission. Refused while offline
    /// (`DeviceCurrentlyOffline`) even if the transport itself is open.
    pub fn transmit(&self, message: Message) -> bool {
        if !self.is_online() {
            self.events
                .add(EventType::DeviceCurrentlyOffline, Severity::Error, self.serial);
            return false;
        }
        self.comm.transmit(message)
    }

    /// Register `handler` to run for every decoded inbound message while
    /// the device is online. The reader task keeps decoding while
    /// offline; decoded messages are simply not forwarded to `handler`
    /// during that time.
    pub fn subscribe(&self, handler: impl Fn(Message) + Send + 'static) -> SubscriptionId {
        let online = self.online.clone();
        self.comm.subscribe(move |message| {
            if online.load(Ordering::SeqCst) {
                handler(message);
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.comm.unsubscribe(id);
    }

    /// Drain events matching `filter` (or every event, if `None`) from
    /// this thread's ring, newest-eviction-safe up to `max` entries.
    pub fn get_events(&self, filter: Option<&EventFilter>, max: Option<usize>) -> Vec<Event> {
        let any = EventFilter::any();
        self.events.get(filter.unwrap_or(&any), max, true)
    }

    /// Remove and return the most recent `Error`-severity event visible to
    /// the calling thread.
    pub fn get_last_error(&self) -> Option<Event> {
        self.events.get_last_error()
    }
}
