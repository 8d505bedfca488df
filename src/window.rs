//! Bounded, gap-free window of per-block fee records.
use alloy_primitives::BlockNumber;

use crate::error::OracleError;
use crate::provider::FeeHistoryBatch;

/// Fee statistics for one settled block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFeeRecord {
    pub block_number: BlockNumber,
    pub base_fee_per_gas: u128,
    pub gas_used_ratio: f64,
    /// One entry per configured percentile, in tier order.
    pub priority_fee_per_gas: Vec<u128>,
}

/// Result of reconciling a fresh batch against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing newer than the cached head was reported.
    NoOp,
    /// The given number of newest blocks were appended and as many evicted.
    Appended(usize),
    /// The batch does not reach back to the cached head; the window was left
    /// untouched and needs a full refresh.
    MissedUpdate,
}

/// Ring buffer over the most recent `capacity` blocks.
///
/// `start_block` is the number of the oldest record, stored at `head`.
/// Records are contiguous: the record at logical offset `i` is block
/// `start_block + i`.
#[derive(Debug, Clone)]
pub struct FeeWindow {
    records: Vec<BlockFeeRecord>,
    head: usize,
    start_block: BlockNumber,
    capacity: usize,
}

impl FeeWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            head: 0,
            start_block: 0,
            capacity,
        }
    }

    /// Builds a window from contiguous ascending records, keeping the newest
    /// `capacity` of them.
    pub fn from_records(
        capacity: usize,
        records: Vec<BlockFeeRecord>,
    ) -> Result<Self, OracleError> {
        let mut window = Self::with_capacity(capacity);
        let skip = records.len().saturating_sub(capacity);
        for record in records.into_iter().skip(skip) {
            window.push(record)?;
        }
        Ok(window)
    }

    pub fn from_batch(capacity: usize, batch: FeeHistoryBatch) -> Result<Self, OracleError> {
        Self::from_records(capacity, batch.into_records())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest_block(&self) -> Option<BlockNumber> {
        (!self.is_empty()).then_some(self.start_block)
    }

    pub fn newest_block(&self) -> Option<BlockNumber> {
        (!self.is_empty()).then(|| self.start_block + self.records.len() as u64 - 1)
    }

    /// Records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &BlockFeeRecord> {
        let (wrapped, tail) = self.records.split_at(self.head);
        tail.iter().chain(wrapped.iter())
    }

    pub fn block_numbers(&self) -> Vec<BlockNumber> {
        self.iter().map(|r| r.block_number).collect()
    }

    pub fn is_contiguous(&self) -> bool {
        self.iter()
            .enumerate()
            .all(|(i, r)| r.block_number == self.start_block + i as u64)
    }

    /// Appends the next block, evicting the oldest once at capacity.
    pub fn push(&mut self, record: BlockFeeRecord) -> Result<(), OracleError> {
        if self.capacity == 0 {
            return Ok(());
        }
        if let Some(newest) = self.newest_block() {
            if record.block_number != newest + 1 {
                return Err(OracleError::Discontinuity {
                    expected: newest + 1,
                    found: record.block_number,
                });
            }
        } else {
            self.start_block = record.block_number;
        }

        if self.records.len() < self.capacity {
            self.records.push(record);
        } else {
            self.records[self.head] = record;
            self.head = (self.head + 1) % self.capacity;
            self.start_block += 1;
        }
        debug_assert!(self.is_contiguous());
        Ok(())
    }

    /// Applies the newest blocks of `batch` that the window has not seen yet.
    ///
    /// With `n = batch.newest - window.newest`, a batch of `k` blocks can
    /// bridge the window only when `n <= k`; otherwise some block in between
    /// was never observed and the outcome is [`UpdateOutcome::MissedUpdate`].
    pub fn apply_increment(
        &mut self,
        batch: &FeeHistoryBatch,
    ) -> Result<UpdateOutcome, OracleError> {
        let Some(current_newest) = self.newest_block() else {
            return Ok(UpdateOutcome::MissedUpdate);
        };
        let Some(batch_newest) = batch.newest_block() else {
            return Ok(UpdateOutcome::NoOp);
        };
        if batch_newest <= current_newest {
            return Ok(UpdateOutcome::NoOp);
        }

        let blocks_to_add = (batch_newest - current_newest) as usize;
        if blocks_to_add > batch.len() {
            return Ok(UpdateOutcome::MissedUpdate);
        }

        let fresh = &batch.records()[batch.len() - blocks_to_add..];
        if fresh[0].block_number != current_newest + 1 {
            return Err(OracleError::Discontinuity {
                expected: current_newest + 1,
                found: fresh[0].block_number,
            });
        }
        for record in fresh {
            self.push(record.clone())?;
        }
        Ok(UpdateOutcome::Appended(blocks_to_add))
    }
}
