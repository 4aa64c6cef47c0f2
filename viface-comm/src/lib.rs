//! Communication: owns a driver, a packetizer, and a codec, and spawns
//! the reader/writer tasks that move messages between them.
//!
//! This is a single owner holding everything by value (the driver behind
//! one `Arc<Mutex<_>>` shared by both tasks), replacing the source's
//! shared-ownership pointer graph with plain ownership plus explicit
//! shared state where the two tasks genuinely need it.
//!
//! One simplification worth naming: the driver is guarded by a single
//! mutex, so a blocking `read` and a blocking `write_internal` serialize
//! against each other even though a real half-duplex-unaware transport
//! could service both concurrently. Acceptable here because every driver
//! in this workspace (the loopback driver, any mock) treats `read` as a
//! short poll rather than an indefinite block.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use viface_codec::{CodecConfig, Message};
use viface_events::{DeviceSerial, EventManager, EventType, Severity};
use viface_transport::{Driver, DriverError};
use viface_wire::{EthernetPacketizer, EthernetPacketizerConfig, Packetizer, PacketizerConfig};

/// Handle returned by [`Communication::subscribe`], used to later
/// [`Communication::unsubscribe`].
pub type SubscriptionId = u64;

/// Per-device tunables threaded down into the packetizer, codec, and
/// (optionally) the Ethernet tunnel.
#[derive(Clone, Copy, Debug)]
pub struct CommConfig {
    pub packetizer: PacketizerConfig,
    pub codec: CodecConfig,
    /// `Some` when the transport is raw Ethernet and frames must be
    /// tunneled through C3; `None` for a direct byte-stream transport.
    pub ethernet: Option<EthernetPacketizerConfig>,
    /// Bound on each subscriber's per-message queue; a slow subscriber
    /// drops messages past this rather than stalling the reader.
    pub subscriber_queue_capacity: usize,
    /// How long the writer task sleeps between polls of
    /// `write_queue_full` before retrying a blocked write.
    pub write_backoff: Duration,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            packetizer: PacketizerConfig::default(),
            codec: CodecConfig::default(),
            ethernet: None,
            subscriber_queue_capacity: 64,
            write_backoff: Duration::from_millis(2),
        }
    }
}

struct Subscriber {
    sender: mpsc::SyncSender<Message>,
}

fn dispatch(
    subscribers: &Mutex<HashMap<SubscriptionId, Subscriber>>,
    message: &Message,
    events: &EventManager,
    serial: Option<DeviceSerial>,
) {
    let subs = subscribers.lock().unwrap();
    for sub in subs.values() {
        if sub.sender.try_send(message.clone()).is_err() {
            events.add(EventType::PollingMessageOverflow, Severity::Warning, serial);
        }
    }
}

/// Owns a driver, a byte packetizer, an optional Ethernet tunnel, and a
/// codec; runs the reader and writer tasks for one open device.
pub struct Communication<D: Driver + 'static> {
    driver: Arc<Mutex<D>>,
    events: Arc<EventManager>,
    serial: Option<DeviceSerial>,
    config: CommConfig,
    outbound_tx: Sender<Message>,
    subscribers: Arc<Mutex<HashMap<SubscriptionId, Subscriber>>>,
    next_subscription_id: AtomicU64,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl<D: Driver + 'static> Communication<D> {
    pub fn new(
        driver: D,
        events: Arc<EventManager>,
        serial: Option<DeviceSerial>,
        config: CommConfig,
    ) -> Self {
        let (outbound_tx, _unused_until_open) = mpsc::channel();
        Self {
            driver: Arc::new(Mutex::new(driver)),
            events,
            serial,
            config,
            outbound_tx,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_subscription_id: AtomicU64::new(0),
            shutdown: Arc::new(AtomicBool::new(true)),
            reader: None,
            writer: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.driver.lock().unwrap().is_open()
    }

    /// Open the driver and spawn the reader/writer tasks.
    pub fn open(&mut self) -> bool {
        if self.driver.lock().unwrap().is_open() {
            self.events
                .add(EventType::DeviceCurrentlyOpen, Severity::Error, self.serial);
            return false;
        }
        if !self.driver.lock().unwrap().open() {
            self.events
                .add(EventType::DriverFailedToOpen, Severity::Error, self.serial);
            return false;
        }

        self.shutdown.store(false, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel::<Message>();
        self.outbound_tx = tx;

        self.reader = Some(spawn_reader(
            self.driver.clone(),
            self.events.clone(),
            self.serial,
            self.config,
            self.subscribers.clone(),
            self.shutdown.clone(),
        ));
        self.writer = Some(spawn_writer(
            self.driver.clone(),
            self.events.clone(),
            self.serial,
            self.config,
            rx,
            self.shutdown.clone(),
        ));
        true
    }

    /// Signal shutdown, drain and join both tasks, then close the driver.
    pub fn close(&mut self) -> bool {
        self.shutdown.store(true, Ordering::SeqCst);
        // Dropping the sender unblocks the writer's `for message in rx`.
        let (unused_tx, _) = mpsc::channel();
        self.outbound_tx = unused_tx;

        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }

        let closed = self.driver.lock().unwrap().close();
        if !closed {
            self.events
                .add(EventType::DriverFailedToClose, Severity::Error, self.serial);
        }
        closed
    }

    /// Queue a message for the writer task. `false` if the device isn't
    /// open or the writer task has already exited.
    pub fn transmit(&self, message: Message) -> bool {
        if !self.driver.lock().unwrap().is_open() {
            self.events
                .add(EventType::DeviceCurrentlyClosed, Severity::Error, self.serial);
            return false;
        }
        match self.outbound_tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                self.events
                    .add(EventType::FailedToWrite, Severity::Error, self.serial);
                false
            }
        }
    }

    /// Register `handler` to be invoked on a dedicated thread for every
    /// decoded inbound message, hung off a bounded per-subscriber queue
    /// so a slow handler can't stall the reader task.
    pub fn subscribe(&self, handler: impl Fn(Message) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::sync_channel::<Message>(self.config.subscriber_queue_capacity);
        self.subscribers
            .lock()
            .unwrap()
            .insert(id, Subscriber { sender: tx });
        std::thread::spawn(move || {
            for message in rx {
                handler(message);
            }
        });
        id
    }

    /// Unregister a subscriber; its dispatch thread exits once its queue
    /// drains.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().remove(&id);
    }
}

fn spawn_reader<D: Driver + 'static>(
    driver: Arc<Mutex<D>>,
    events: Arc<EventManager>,
    serial: Option<DeviceSerial>,
    config: CommConfig,
    subscribers: Arc<Mutex<HashMap<SubscriptionId, Subscriber>>>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut packetizer = Packetizer::new(config.packetizer);
        let mut ethernet = config.ethernet.map(EthernetPacketizer::new);

        while !shutdown.load(Ordering::Relaxed) {
            let read = driver.lock().unwrap().read();
            let bytes = match read {
                Ok(bytes) => bytes,
                Err(DriverError::Disconnected) => {
                    events.add(EventType::DeviceDisconnected, Severity::Error, serial);
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            };
            if bytes.is_empty() {
                continue;
            }

            let bodies = if let Some(eth) = ethernet.as_mut() {
                eth.input_up(&bytes, &events, serial);
                eth.output_up()
                    .into_iter()
                    .flat_map(|frame| packetizer.decode(&frame, &events, serial))
                    .collect::<Vec<_>>()
            } else {
                packetizer.decode(&bytes, &events, serial)
            };

            for body in bodies {
                if let Some(message) = viface_codec::decode(&config.codec, &body, &events, serial)
                {
                    dispatch(&subscribers, &message, &events, serial);
                }
            }
        }
        tracing::debug!("reader task exiting");
    })
}

fn spawn_writer<D: Driver + 'static>(
    driver: Arc<Mutex<D>>,
    events: Arc<EventManager>,
    serial: Option<DeviceSerial>,
    config: CommConfig,
    rx: mpsc::Receiver<Message>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let packetizer = Packetizer::new(config.packetizer);
        let mut ethernet = config.ethernet.map(EthernetPacketizer::new);

        for message in rx {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let Some(body) = viface_codec::encode(&config.codec, &message, &events, serial) else {
                continue;
            };
            let framed = packetizer.encode(&body);

            let outgoing = if let Some(eth) = ethernet.as_mut() {
                eth.input_down(framed);
                eth.output_down()
            } else {
                vec![framed]
            };

            for frame in outgoing {
                loop {
                    let full = driver.lock().unwrap().write_queue_full();
                    if !full || shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    tracing::trace!("write queue full, backing off");
                    std::thread::sleep(config.write_backoff);
                }
                if shutdown.load(Ordering::Relaxed) {
                    return;
                }
                if !driver.lock().unwrap().write_internal(&frame) {
                    events.add(EventType::FailedToWrite, Severity::Error, serial);
                }
            }
        }
        tracing::debug!("writer task exiting");
    })
}
