//! Reference aligned read driver for devices using the extended-extractor
//! command set, with a short-TTL cache for the most recently read block.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use viface_events::{EventType, Severity};

use crate::{DiskAccess, ReadDriver};

const SECTOR_SIZE: u32 = 512;
const MAX_SIZE: u32 = SECTOR_SIZE * 512;
const CACHE_TTL: Duration = Duration::from_secs(1);
const HEADER_LEN: usize = 7;

/// The device-specific protocol round-trip this driver needs: ask for up
/// to `amount` bytes starting at `pos`, returning the raw reply
/// (including its 7-byte header) or `None` on transport failure.
///
/// Kept as a trait so this driver can be tested without a real device
/// protocol behind it; concrete transports (USB/FTDI, Ethernet, shared
/// memory) are out of scope for this crate.
pub trait DiskTransport: Send {
    fn request(&mut self, pos: u64, amount: u32, timeout: Duration) -> Option<Vec<u8>>;
}

struct CacheEntry {
    base: u64,
    data: Vec<u8>,
    at: Instant,
}

/// Reads aligned blocks via the extended-extractor protocol, caching the
/// most recently read block for [`CACHE_TTL`] and stripping the 7-byte
/// reply header before returning data to the caller.
pub struct ExtExtractorDiskReadDriver<T: DiskTransport> {
    transport: T,
    vsa_offset: u64,
    cache: Mutex<Option<CacheEntry>>,
}

impl<T: DiskTransport> ExtExtractorDiskReadDriver<T> {
    pub fn new(transport: T, vsa_offset: u64) -> Self {
        Self {
            transport,
            vsa_offset,
            cache: Mutex::new(None),
        }
    }

    /// Drop the cached block. Callers must invalidate on any write to
    /// keep the read cache from serving stale data.
    pub fn invalidate_cache(&self) {
        *self.cache.lock().unwrap() = None;
    }
}

impl<T: DiskTransport> ReadDriver for ExtExtractorDiskReadDriver<T> {
    fn vsa_offset(&self) -> u64 {
        self.vsa_offset
    }

    fn block_size_bounds(&self) -> (u32, u32) {
        (SECTOR_SIZE, MAX_SIZE)
    }

    fn possible_access(&self) -> DiskAccess {
        DiskAccess::EntireCard
    }

    fn read_logical_disk_aligned(
        &mut self,
        pos: u64,
        into: &mut [u8],
        amount: u32,
        timeout: Duration,
        report: &mut dyn FnMut(EventType, Severity),
    ) -> Option<u64> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.as_ref() {
                if entry.base == pos && entry.at.elapsed() < CACHE_TTL {
                    let n = (amount as usize).min(entry.data.len());
                    into[..n].copy_from_slice(&entry.data[..n]);
                    return Some(n as u64);
                }
            }
        }

        let reply = self.transport.request(pos, amount, timeout)?;
        if reply.len() < HEADER_LEN {
            report(EventType::PacketDecodingError, Severity::Error);
            return None;
        }
        let data = &reply[HEADER_LEN..];
        let n = data.len().min(amount as usize);
        into[..n].copy_from_slice(&data[..n]);

        *self.cache.lock().unwrap() = Some(CacheEntry {
            base: pos,
            data: data.to_vec(),
            at: Instant::now(),
        });
        Some(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTransport {
        calls: Arc<AtomicUsize>,
        reply: Vec<u8>,
    }

    impl DiskTransport for CountingTransport {
        fn request(&mut self, _pos: u64, _amount: u32, _timeout: Duration) -> Option<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(self.reply.clone())
        }
    }

    fn noop_report(_: EventType, _: Severity) {}

    #[test]
    fn strips_the_seven_byte_reply_header() {
        let mut header = vec![0xFFu8; HEADER_LEN];
        let mut payload = vec![1, 2, 3, 4];
        header.append(&mut payload);
        let transport = CountingTransport {
            calls: Arc::new(AtomicUsize::new(0)),
            reply: header,
        };
        let mut driver = ExtExtractorDiskReadDriver::new(transport, 0);
        let mut into = vec![0u8; 4];
        let n = driver
            .read_logical_disk_aligned(0, &mut into, 4, Duration::from_secs(1), &mut noop_report)
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(into, vec![1, 2, 3, 4]);
    }

    #[test]
    fn repeated_reads_within_the_ttl_hit_the_cache_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reply = vec![0u8; HEADER_LEN];
        reply.extend_from_slice(&[9, 9]);
        let transport = CountingTransport {
            calls: calls.clone(),
            reply,
        };
        let mut driver = ExtExtractorDiskReadDriver::new(transport, 0);
        let mut into = vec![0u8; 2];

        driver
            .read_logical_disk_aligned(100, &mut into, 2, Duration::from_secs(1), &mut noop_report)
            .unwrap();
        driver
            .read_logical_disk_aligned(100, &mut into, 2, Duration::from_secs(1), &mut noop_report)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalidating_the_cache_forces_a_fresh_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut reply = vec![0u8; HEADER_LEN];
        reply.push(1);
        let transport = CountingTransport {
            calls: calls.clone(),
            reply,
        };
        let mut driver = ExtExtractorDiskReadDriver::new(transport, 0);
        let mut into = vec![0u8; 1];

        driver
            .read_logical_disk_aligned(0, &mut into, 1, Duration::from_secs(1), &mut noop_report)
            .unwrap();
        driver.invalidate_cache();
        driver
            .read_logical_disk_aligned(0, &mut into, 1, Duration::from_secs(1), &mut noop_report)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn a_short_header_is_reported_and_rejected() {
        let transport = CountingTransport {
            calls: Arc::new(AtomicUsize::new(0)),
            reply: vec![0u8; HEADER_LEN - 1],
        };
        let mut driver = ExtExtractorDiskReadDriver::new(transport, 0);
        let mut into = vec![0u8; 4];
        let mut reported = Vec::new();
        let n = driver.read_logical_disk_aligned(
            0,
            &mut into,
            4,
            Duration::from_secs(1),
            &mut |kind, severity| reported.push((kind, severity)),
        );
        assert!(n.is_none());
        assert_eq!(reported, vec![(EventType::PacketDecodingError, Severity::Error)]);
    }
}
