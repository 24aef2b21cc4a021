//! Deterministic batching of a transfer set
//!
//! Batch boundaries depend only on `(entry count, batch size, start index)`,
//! never on prior batch outcomes, so a rerun resumed at any index reproduces
//! the boundaries of an uninterrupted run.

use crate::types::{Coins, TransferEntry, TransferSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("start index {start_index} is out of range for {entry_count} entries")]
    StartIndexOutOfRange {
        start_index: usize,
        entry_count: usize,
    },
}

/// A contiguous slice of a transfer set plus its aggregate amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<'a> {
    /// Absolute index of the first entry in the underlying transfer set
    pub start: usize,
    pub entries: &'a [TransferEntry],
    pub total: Coins,
}

impl Batch<'_> {
    /// Absolute index of the last entry (inclusive).
    pub fn end(&self) -> usize {
        self.start + self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lazy iterator over the batches covering `[start_index, len)`.
#[derive(Debug)]
pub struct Batches<'a> {
    entries: &'a [TransferEntry],
    batch_size: usize,
    next: usize,
}

impl<'a> Batches<'a> {
    pub fn new(
        set: &'a TransferSet,
        batch_size: usize,
        start_index: usize,
    ) -> Result<Self, BatchError> {
        if batch_size == 0 {
            return Err(BatchError::ZeroBatchSize);
        }
        if start_index > set.len() {
            return Err(BatchError::StartIndexOutOfRange {
                start_index,
                entry_count: set.len(),
            });
        }
        Ok(Self {
            entries: &set.entries,
            batch_size,
            next: start_index,
        })
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.entries.len() {
            return None;
        }
        let start = self.next;
        let end = (start + self.batch_size).min(self.entries.len());
        self.next = end;

        let entries = &self.entries[start..end];
        let total = entries
            .iter()
            .fold(Coins::new(), |acc, e| acc.checked_add(&e.amount));
        Some(Batch {
            start,
            entries,
            total,
        })
    }
}
