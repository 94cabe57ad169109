//! Sequence-indexed frame store
//!
//! A bounded mailbox for fixed-size PCM frames arriving out of order.
//! Each 16-bit sequence number maps onto the slot `seq % capacity`; a push
//! unconditionally overwrites whatever the slot held, and a pop hands a
//! frame out exactly once. Recency wins over completeness: when two
//! sequence numbers alias the same slot, the earlier frame is dropped
//! silently rather than blocking the producer.

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::Sample;

/// Statistics for the frame store
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStoreStats {
    /// Number of frames stored
    pub frames_stored: u64,
    /// Number of pushes rejected for a wrong frame length
    pub frames_rejected: u64,
    /// Number of stored frames lost to a slot overwrite before being popped
    pub frames_overwritten: u64,
    /// Number of frames handed out by `pop`
    pub frames_popped: u64,
    /// Number of pops that found no matching frame
    pub pop_misses: u64,
}

/// One slot of the store
#[derive(Debug)]
struct Slot {
    seq: u16,
    valid: bool,
    frame: Vec<Sample>,
}

/// Bounded store mapping sequence numbers to frame slots
pub struct SequencedFrameStore {
    capacity: usize,
    frame_size: usize,
    slots: Vec<Slot>,
    stats: FrameStoreStats,
}

impl SequencedFrameStore {
    /// Create a new store with `capacity` slots of `frame_size` samples each
    pub fn new(capacity: usize, frame_size: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidParameter(
                "Frame store capacity must be non-zero".to_string(),
            ));
        }
        if frame_size == 0 {
            return Err(Error::InvalidParameter(
                "Frame store frame size must be non-zero".to_string(),
            ));
        }

        let slots = (0..capacity)
            .map(|_| Slot {
                seq: 0,
                valid: false,
                frame: vec![0; frame_size],
            })
            .collect();

        Ok(Self {
            capacity,
            frame_size,
            slots,
            stats: FrameStoreStats::default(),
        })
    }

    /// Store a frame under its sequence number
    ///
    /// Overwrites any frame already occupying the slot `seq % capacity`.
    /// Frames of the wrong length are dropped and counted.
    pub fn push(&mut self, seq: u16, frame: &[Sample]) {
        if frame.len() != self.frame_size {
            warn!(
                "Rejecting frame seq={}: {} samples, expected {}",
                seq,
                frame.len(),
                self.frame_size
            );
            self.stats.frames_rejected += 1;
            return;
        }

        let slot = &mut self.slots[seq as usize % self.capacity];
        if slot.valid && slot.seq != seq {
            trace!("Slot overwrite: seq={} replaces seq={}", seq, slot.seq);
            self.stats.frames_overwritten += 1;
        }

        slot.seq = seq;
        slot.valid = true;
        slot.frame.copy_from_slice(frame);
        self.stats.frames_stored += 1;
    }

    /// Retrieve the frame stored under `seq`, if it is still present
    ///
    /// Succeeds only when the slot holds exactly the requested sequence;
    /// a stale alias never matches. On success the frame is copied into
    /// `out` and the slot is invalidated, so each frame pops at most once.
    pub fn pop(&mut self, seq: u16, out: &mut [Sample]) -> bool {
        if out.len() != self.frame_size {
            self.stats.pop_misses += 1;
            return false;
        }

        let slot = &mut self.slots[seq as usize % self.capacity];
        if !slot.valid || slot.seq != seq {
            self.stats.pop_misses += 1;
            return false;
        }

        out.copy_from_slice(&slot.frame);
        slot.valid = false;
        self.stats.frames_popped += 1;
        true
    }

    /// Number of slots in the store
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples per frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Current store statistics
    pub fn stats(&self) -> &FrameStoreStats {
        &self.stats
    }
}
