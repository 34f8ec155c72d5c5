//! Assigns sequences partitioned by calendar day.

use crate::types::{encode_timestamp, Sequence, Timestamp};

/// Hands out monotonically increasing sequences.
///
/// Each day owns the block of sequences starting at its encoded date, so a
/// sequence can be decoded back to the day it was issued in. When a
/// timestamp from a later day arrives the sequencer jumps to that day's
/// block.
#[derive(Clone, Debug)]
pub struct Sequencer {
    next_sequence: Sequence,
}

impl Sequencer {
    pub fn new(initial_sequence: Sequence) -> Self {
        Self {
            next_sequence: initial_sequence,
        }
    }

    /// The sequence the next call will return for a timestamp in the
    /// current partition.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    /// Returns the smallest unused sequence in `timestamp`'s partition.
    pub fn increment_next_sequence(&mut self, timestamp: Timestamp) -> Sequence {
        let partition = encode_timestamp(timestamp);
        if !timestamp.is_special() && partition > self.next_sequence {
            self.next_sequence = partition;
        }
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.increment();
        sequence
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Sequence::FIRST)
    }
}
