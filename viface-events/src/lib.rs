//! Bounded, filterable event ring: the library's exception substitute.
//!
//! No operation in this workspace throws or panics on an operational
//! failure. Instead, every component holds a [`report`](EventManager::add)
//! capability and appends an [`Event`] describing what went wrong. Clients
//! drain or poll the ring instead of catching exceptions.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::thread::ThreadId;
use std::time::SystemTime;

mod description;
mod serial;
mod types;

pub use description::description;
pub use serial::DeviceSerial;
pub use types::{EventType, Severity};

/// A single reported fault, warning, or informational note.
///
/// Events are produced by any component via [`EventManager::add`] and
/// consumed by library clients either by draining the ring
/// ([`EventManager::get`] with `drain = true`) or by polling with a
/// filter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Event {
    kind: EventType,
    severity: Severity,
    timestamp: SystemTime,
    serial: Option<DeviceSerial>,
}

impl Event {
    fn new(kind: EventType, severity: Severity, serial: Option<DeviceSerial>) -> Self {
        Self {
            kind,
            severity,
            timestamp: SystemTime::now(),
            serial,
        }
    }

    /// The fault kind.
    pub fn kind(&self) -> EventType {
        self.kind
    }

    /// The severity this event currently carries.
    ///
    /// Severities are presentation-only; see [`Self::downgrade_from_error`]
    /// for the one place behavior depends on it.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Wall-clock time the event was created, at one-second resolution
    /// when rendered (the field itself retains full precision).
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// The device serial this event is associated with, if any.
    pub fn serial(&self) -> Option<&DeviceSerial> {
        self.serial.as_ref()
    }

    /// The canonical human-readable description for this event's kind.
    pub fn description(&self) -> &'static str {
        description(self.kind)
    }

    /// Whether this event is associated with the device carrying `serial`.
    ///
    /// An event with no device association never matches.
    pub fn is_for_device(&self, serial: &str) -> bool {
        match &self.serial {
            Some(s) => s.as_str() == serial,
            None => false,
        }
    }

    /// Rewrite an `Error`-severity event to `Warning`.
    ///
    /// Used by callers who planned for a failure and want to downgrade a
    /// surfaced error after the fact instead of treating it as fatal.
    pub fn downgrade_from_error(&mut self) {
        self.severity = Severity::Warning;
    }

    /// A one-line human-readable rendering, e.g. `"RS232001 Error: A read
    /// operation failed."` or `"API Warning: ..."` for events with no
    /// associated device.
    pub fn describe(&self) -> String {
        let subject = self
            .serial
            .as_ref()
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "API".to_string());
        format!("{} {}: {}", subject, self.severity, self.description())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Criteria an [`Event`] is matched against by [`EventManager::get`] and
/// [`EventManager::downgrade_errors`].
///
/// An event matches iff every specified field matches; `None`/`Any` means
/// "don't care".
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Restrict to a single event kind. `None` matches any kind.
    pub kind: Option<EventType>,
    /// Restrict to a single severity. `None` matches any severity.
    pub severity: Option<Severity>,
    /// Restrict to events carrying this exact device serial.
    pub serial: Option<DeviceSerial>,
    /// Restrict to events that came from *some* device, regardless of
    /// which one (mutually refining with `serial`, not exclusive of it).
    pub match_on_device_ptr: bool,
}

impl EventFilter {
    /// A filter that matches every event.
    pub fn any() -> Self {
        Self::default()
    }

    /// A filter restricted to a single kind.
    pub fn of_kind(kind: EventType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// A filter restricted to a single severity.
    pub fn of_severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ..Self::default()
        }
    }

    fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if kind != event.kind {
                return false;
            }
        }
        if self.match_on_device_ptr && event.serial.is_none() {
            return false;
        }
        if let Some(severity) = self.severity {
            if severity != event.severity {
                return false;
            }
        }
        if let Some(serial) = &self.serial {
            if !event.is_for_device(serial.as_str()) {
                return false;
            }
        }
        true
    }
}

/// How many events a single ring (per-thread or global) retains before it
/// starts evicting the oldest entry to make room for new ones.
#[derive(Clone, Copy, Debug)]
pub struct EventManagerConfig {
    pub ring_capacity: usize,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self { ring_capacity: 1024 }
    }
}

/// A single bounded, ordered sequence of events, with overflow tracking.
struct Ring {
    events: VecDeque<Event>,
    capacity: usize,
    /// Set once a `TooManyEvents` marker has been synthesized, and cleared
    /// again only when that marker leaves the ring (drained or evicted) —
    /// this is what makes overflow observable exactly once per episode
    /// instead of once per dropped event.
    overflowed: bool,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            overflowed: false,
        }
    }

    fn evict_oldest(&mut self) -> Option<Event> {
        let removed = self.events.pop_front();
        if let Some(e) = &removed {
            if e.kind == EventType::TooManyEvents {
                self.overflowed = false;
            }
        }
        removed
    }

    fn push(&mut self, event: Event) {
        if self.events.len() < self.capacity {
            self.events.push_back(event);
            return;
        }
        if !self.overflowed {
            // The incoming event is represented by the marker itself, not
            // stored separately, so the ring never grows past `capacity`.
            self.overflowed = true;
            self.evict_oldest();
            self.events
                .push_back(Event::new(EventType::TooManyEvents, Severity::Error, None));
            tracing::warn!("event ring overflowed, oldest events dropped");
            return;
        }
        self.evict_oldest();
        self.events.push_back(event);
    }

    fn get(&mut self, filter: &EventFilter, max: Option<usize>, drain: bool) -> Vec<Event> {
        let limit = max.unwrap_or(usize::MAX);
        if !drain {
            return self
                .events
                .iter()
                .filter(|e| filter.matches(e))
                .take(limit)
                .cloned()
                .collect();
        }

        let mut out = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.events.len());
        for event in self.events.drain(..) {
            if out.len() < limit && filter.matches(&event) {
                if event.kind == EventType::TooManyEvents {
                    self.overflowed = false;
                }
                out.push(event);
            } else {
                remaining.push_back(event);
            }
        }
        self.events = remaining;
        out
    }

    fn get_last_error(&mut self) -> Option<Event> {
        let idx = self
            .events
            .iter()
            .rposition(|e| e.severity == Severity::Error)?;
        let event = self.events.remove(idx)?;
        if event.kind == EventType::TooManyEvents {
            self.overflowed = false;
        }
        Some(event)
    }

    fn downgrade(&mut self, filter: &EventFilter) {
        for event in self.events.iter_mut() {
            if filter.matches(event) && event.severity == Severity::Error {
                event.downgrade_from_error();
            }
        }
    }
}

/// Per-thread bounded event rings, plus one global ring for threads that
/// never registered.
///
/// Threads register so that `add`/`get`/`get_last_error` called from that
/// thread see only events reported by (or addressed to) that thread. A
/// thread that never calls [`Self::register_thread`] reports to, and
/// reads from, the shared global ring instead.
pub struct EventManager {
    config: EventManagerConfig,
    global: Mutex<Ring>,
    per_thread: Mutex<HashMap<ThreadId, Ring>>,
}

impl EventManager {
    pub fn new(config: EventManagerConfig) -> Self {
        Self {
            global: Mutex::new(Ring::new(config.ring_capacity)),
            per_thread: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Give the calling thread its own event ring.
    pub fn register_thread(&self) {
        let mut threads = self.per_thread.lock().unwrap();
        threads
            .entry(std::thread::current().id())
            .or_insert_with(|| Ring::new(self.config.ring_capacity));
    }

    /// Remove the calling thread's ring; subsequent calls from this thread
    /// fall back to the global ring.
    pub fn unregister_thread(&self) {
        let mut threads = self.per_thread.lock().unwrap();
        threads.remove(&std::thread::current().id());
    }

    fn with_calling_ring<R>(&self, f: impl FnOnce(&mut Ring) -> R) -> R {
        let mut threads = self.per_thread.lock().unwrap();
        if let Some(ring) = threads.get_mut(&std::thread::current().id()) {
            return f(ring);
        }
        drop(threads);
        let mut global = self.global.lock().unwrap();
        f(&mut global)
    }

    /// Append an event. Never fails: an event is either stored, or it
    /// evicts the oldest entry (synthesizing `TooManyEvents` the first
    /// time this happens for the current episode).
    pub fn add(&self, kind: EventType, severity: Severity, serial: Option<DeviceSerial>) {
        debug_assert_ne!(
            kind,
            EventType::Any,
            "EventType::Any is a filter sentinel, not reportable"
        );
        self.with_calling_ring(|ring| ring.push(Event::new(kind, severity, serial)));
    }

    /// Return a copy of matching events, optionally removing them from the
    /// ring (`drain = true`). Returns an empty vector when nothing matches.
    pub fn get(&self, filter: &EventFilter, max: Option<usize>, drain: bool) -> Vec<Event> {
        self.with_calling_ring(|ring| ring.get(filter, max, drain))
    }

    /// Return and remove the most recent `Error`-severity event visible to
    /// the calling thread, or `None` if there isn't one.
    pub fn get_last_error(&self) -> Option<Event> {
        self.with_calling_ring(|ring| ring.get_last_error())
    }

    /// Rewrite matching events' severity from `Error` to `Warning`, in
    /// place, without removing them from the ring.
    pub fn downgrade_errors(&self, filter: &EventFilter) {
        self.with_calling_ring(|ring| ring.downgrade(filter));
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(EventManagerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get_roundtrips() {
        let mgr = EventManager::default();
        mgr.add(EventType::Timeout, Severity::Error, None);
        let got = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].kind(), EventType::Timeout);
    }

    #[test]
    fn get_without_drain_leaves_events_in_place() {
        let mgr = EventManager::default();
        mgr.add(EventType::Timeout, Severity::Error, None);
        let _ = mgr.get(&EventFilter::any(), None, false);
        let got = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn get_with_drain_removes_matched_events() {
        let mgr = EventManager::default();
        mgr.add(EventType::Timeout, Severity::Error, None);
        let got = mgr.get(&EventFilter::any(), None, true);
        assert_eq!(got.len(), 1);
        let got = mgr.get(&EventFilter::any(), None, false);
        assert!(got.is_empty());
    }

    #[test]
    fn filter_matches_exact_fields_only() {
        let mgr = EventManager::default();
        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::FailedToRead, Severity::Warning, None);

        let matching = mgr.get(&EventFilter::of_kind(EventType::Timeout), None, false);
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].kind(), EventType::Timeout);
    }

    #[test]
    fn get_last_error_returns_and_removes_most_recent_error() {
        let mgr = EventManager::default();
        mgr.add(EventType::FailedToRead, Severity::Warning, None);
        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::FailedToWrite, Severity::Error, None);

        let last = mgr.get_last_error().expect("an error was present");
        assert_eq!(last.kind(), EventType::FailedToWrite);

        let remaining = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|e| e.kind() != EventType::FailedToWrite));
    }

    #[test]
    fn get_last_error_is_none_when_no_errors_present() {
        let mgr = EventManager::default();
        mgr.add(EventType::AtomicOperationRetried, Severity::Info, None);
        assert!(mgr.get_last_error().is_none());
    }

    #[test]
    fn downgrade_errors_only_affects_matching_errors() {
        let mgr = EventManager::default();
        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::FailedToRead, Severity::Error, None);

        mgr.downgrade_errors(&EventFilter::of_kind(EventType::Timeout));

        let events = mgr.get(&EventFilter::any(), None, false);
        let timeout = events.iter().find(|e| e.kind() == EventType::Timeout).unwrap();
        let failed_read = events
            .iter()
            .find(|e| e.kind() == EventType::FailedToRead)
            .unwrap();
        assert_eq!(timeout.severity(), Severity::Warning);
        assert_eq!(failed_read.severity(), Severity::Error);
    }

    #[test]
    fn overflow_synthesizes_too_many_events_exactly_once_per_episode() {
        let mgr = EventManager::new(EventManagerConfig { ring_capacity: 4 });
        for _ in 0..4 {
            mgr.add(EventType::Timeout, Severity::Error, None);
        }
        // Ring now full with 4 Timeouts, no overflow yet.
        assert_eq!(mgr.get(&EventFilter::any(), None, false).len(), 4);

        mgr.add(EventType::Timeout, Severity::Error, None);
        let after_first_overflow = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(after_first_overflow.len(), 4);
        let too_many = after_first_overflow
            .iter()
            .filter(|e| e.kind() == EventType::TooManyEvents)
            .count();
        assert_eq!(too_many, 1, "exactly one overflow marker for this episode");

        // Keep overflowing: no additional TooManyEvents markers should appear
        // while the episode continues (ring never exceeds its bound either).
        for _ in 0..5 {
            mgr.add(EventType::Timeout, Severity::Error, None);
        }
        let still = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(still.len(), 4);
        assert_eq!(
            still.iter().filter(|e| e.kind() == EventType::TooManyEvents).count(),
            1
        );
    }

    #[test]
    fn overflow_can_recur_after_the_marker_is_drained() {
        let mgr = EventManager::new(EventManagerConfig { ring_capacity: 2 });
        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::Timeout, Severity::Error, None); // overflow #1

        let drained = mgr.get(&EventFilter::any(), None, true);
        assert!(drained.iter().any(|e| e.kind() == EventType::TooManyEvents));

        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::Timeout, Severity::Error, None);
        mgr.add(EventType::Timeout, Severity::Error, None); // overflow #2, new episode

        let events = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(
            events.iter().filter(|e| e.kind() == EventType::TooManyEvents).count(),
            1
        );
    }

    #[test]
    fn registered_thread_ring_is_isolated_from_global() {
        let mgr = std::sync::Arc::new(EventManager::default());
        mgr.add(EventType::Timeout, Severity::Error, None); // goes to global

        let mgr2 = mgr.clone();
        let handle = std::thread::spawn(move || {
            mgr2.register_thread();
            mgr2.add(EventType::FailedToRead, Severity::Warning, None);
            let local = mgr2.get(&EventFilter::any(), None, false);
            assert_eq!(local.len(), 1);
            assert_eq!(local[0].kind(), EventType::FailedToRead);
            mgr2.unregister_thread();
        });
        handle.join().unwrap();

        let global = mgr.get(&EventFilter::any(), None, false);
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].kind(), EventType::Timeout);
    }

    #[test]
    fn filter_on_device_serial() {
        let mgr = EventManager::default();
        let serial_a = DeviceSerial::new("RS1234").unwrap();
        let serial_b = DeviceSerial::new("RS5678").unwrap();
        mgr.add(EventType::Timeout, Severity::Error, Some(serial_a));
        mgr.add(EventType::Timeout, Severity::Error, Some(serial_b));

        let filter = EventFilter {
            serial: Some(serial_a),
            ..EventFilter::any()
        };
        let matched = mgr.get(&filter, None, false);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].serial().unwrap().as_str(), "RS1234");
    }

    #[test]
    fn describe_includes_device_serial_and_severity() {
        let serial = DeviceSerial::new("RS1234").unwrap();
        let mgr = EventManager::default();
        mgr.add(EventType::Timeout, Severity::Error, Some(serial));
        let event = &mgr.get(&EventFilter::any(), None, false)[0];
        let text = event.describe();
        assert!(text.starts_with("RS1234"));
        assert!(text.contains("Error"));
        assert!(text.contains(description(EventType::Timeout)));
    }
}
