//! Disk write driver: a read-modify-write loop over aligned blocks,
//! backed by an atomic-write primitive that may ask to be retried.

use std::time::{Duration, Instant};

use viface_events::{EventType, Severity};

use crate::ReadDriver;

/// Result of one aligned write attempt, replacing the source's
/// `RetryAtomic` sentinel (`u64::MAX`) with an explicit third state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlignedWriteOutcome {
    /// The write committed; `n` bytes of `new_block` took effect.
    Written(u64),
    /// The device detected a race against `old_block` and the block must
    /// be re-read and retried from scratch.
    Retry,
}

/// A driver capable of committing one aligned block write, atomically
/// when possible.
pub trait WriteDriver: Send {
    fn vsa_offset(&self) -> u64 {
        0
    }

    fn block_size_bounds(&self) -> (u32, u32);

    /// Severity used for `AtomicOperationCompletedNonatomically` when a
    /// write for this driver commits without the atomicity guarantee.
    fn nonatomic_severity(&self) -> Severity {
        Severity::Info
    }

    /// Attempt to write `new_block` over the block at `pos`, conditioned
    /// on the device's current contents matching `old_block`.
    fn write_logical_disk_aligned(
        &mut self,
        pos: u64,
        old_block: &[u8],
        new_block: &[u8],
        amount: u32,
        timeout: Duration,
        report: &mut dyn FnMut(EventType, Severity),
    ) -> Option<AlignedWriteOutcome>;
}

/// Write `amount` bytes from `from` to logical position `pos`, reading
/// back each affected block first so a partial-block write can be
/// overlaid without clobbering neighboring bytes.
///
/// Mirrors the source's block loop precisely, including which event kind
/// a short result is classified as: `Timeout` if the budget is spent,
/// `ParameterOutOfRange` if nothing has been written yet, `EOFReached`
/// otherwise. `RetryAtomic` is no longer a sentinel value — it's
/// [`AlignedWriteOutcome::Retry`], handled by looping on the same block
/// without reporting an error (`AtomicOperationRetried`/`Info` is still
/// reported, since callers may want to observe retry pressure).
pub fn write_logical_disk<W: WriteDriver, R: ReadDriver>(
    write_driver: &mut W,
    read_driver: &mut R,
    pos: u64,
    from: &[u8],
    amount: u64,
    mut timeout: Duration,
    report: &mut dyn FnMut(EventType, Severity),
) -> Option<u64> {
    if amount == 0 {
        return Some(0);
    }

    let ideal = write_driver.block_size_bounds().1 as u64;
    let pos = pos + write_driver.vsa_offset();
    let start_block = pos / ideal;
    let pos_within_first_block = (pos % ideal) as usize;

    let mut blocks = amount / ideal + if amount % ideal != 0 { 1 } else { 0 };
    if blocks * ideal - pos_within_first_block as u64 < amount {
        blocks += 1;
    }

    let mut acc: u64 = 0;
    let mut blocks_processed: u64 = 0;
    let mut atomic_buffer = vec![0u8; ideal as usize];

    while blocks_processed < blocks && !timeout_expired(timeout) {
        let current_block = start_block + blocks_processed;

        let mut from_offset = blocks_processed * ideal;
        from_offset = if from_offset < pos_within_first_block as u64 {
            0
        } else {
            from_offset - pos_within_first_block as u64
        };

        let pos_within_current_block = if blocks_processed == 0 {
            pos_within_first_block
        } else {
            0
        };
        let mut cur_amt = ideal - pos_within_current_block as u64;
        let amount_left = amount - acc;
        if cur_amt > amount_left {
            cur_amt = amount_left;
        }

        let started = Instant::now();
        let blocks_processed_before_read = blocks_processed;
        let got = read_driver.read_logical_disk(
            current_block * ideal,
            &mut atomic_buffer,
            ideal,
            timeout,
            &mut |kind, severity| {
                let kind = if kind == EventType::ParameterOutOfRange && blocks_processed_before_read > 0 {
                    EventType::EOFReached
                } else {
                    kind
                };
                report(kind, severity);
            },
        );
        timeout = timeout.saturating_sub(started.elapsed());

        if got != Some(ideal) {
            break; // read_logical_disk already reported the cause.
        }

        let use_aligned_write_buffer = pos_within_current_block != 0 || cur_amt != ideal;
        let new_block: Vec<u8> = if use_aligned_write_buffer {
            let mut buffer = atomic_buffer.clone();
            let start = pos_within_current_block;
            let end = start + cur_amt as usize;
            let src_start = from_offset as usize;
            buffer[start..end].copy_from_slice(&from[src_start..src_start + cur_amt as usize]);
            buffer
        } else {
            from[from_offset as usize..from_offset as usize + cur_amt as usize].to_vec()
        };

        let started = Instant::now();
        let outcome = write_driver.write_logical_disk_aligned(
            current_block * ideal,
            &atomic_buffer,
            &new_block,
            ideal as u32,
            timeout,
            report,
        );
        timeout = timeout.saturating_sub(started.elapsed());

        match outcome {
            Some(AlignedWriteOutcome::Retry) => {
                report(EventType::AtomicOperationRetried, Severity::Info);
                continue;
            }
            Some(AlignedWriteOutcome::Written(n)) if n >= cur_amt => {
                acc += n.min(cur_amt);
                blocks_processed += 1;
            }
            other => {
                let written = match other {
                    Some(AlignedWriteOutcome::Written(n)) => n,
                    _ => 0,
                };
                if timeout_expired(timeout) {
                    report(EventType::Timeout, Severity::Error);
                } else if blocks_processed > 0 || written != 0 {
                    report(EventType::EOFReached, Severity::Error);
                } else {
                    report(EventType::ParameterOutOfRange, Severity::Error);
                }
                break;
            }
        }
    }

    if acc == 0 {
        None
    } else {
        Some(acc)
    }
}

fn timeout_expired(timeout: Duration) -> bool {
    timeout == Duration::ZERO
}
