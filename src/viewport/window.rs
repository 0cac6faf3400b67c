//! The bounded, contiguous slice of a dataset held in memory.

use std::collections::VecDeque;

use super::domain::ValueRange;
use crate::models::Candle;

/// Loaded candles plus their position within the full dataset.
///
/// Candles are ascending and contiguous at the current interval, and their
/// sequence indices always run `0..len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    candles: VecDeque<Candle>,
    logical_offset: usize,
    total_count: usize,
}

impl Window {
    /// Creates a window whose first candle sits at `logical_offset`.
    #[must_use]
    pub fn new(candles: Vec<Candle>, logical_offset: usize, total_count: usize) -> Self {
        let mut window = Self {
            candles: candles.into(),
            logical_offset,
            total_count,
        };
        window.reindex();
        window
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Dataset position of the first loaded candle.
    pub fn logical_offset(&self) -> usize {
        self.logical_offset
    }

    /// Buckets available at the current interval.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Dataset position one past the last loaded candle.
    pub fn end_offset(&self) -> usize {
        self.logical_offset + self.candles.len()
    }

    /// Buckets after the window that have not been loaded.
    pub fn remaining_after(&self) -> usize {
        self.total_count.saturating_sub(self.end_offset())
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    /// Padded range of the loaded candles.
    pub fn value_range(&self) -> Option<ValueRange> {
        ValueRange::padded(&self.candles)
    }

    /// Inserts `candles` immediately before the window.
    pub(crate) fn prepend(&mut self, candles: Vec<Candle>) {
        self.logical_offset = self.logical_offset.saturating_sub(candles.len());
        for candle in candles.into_iter().rev() {
            self.candles.push_front(candle);
        }
        self.reindex();
    }

    /// Inserts `candles` immediately after the window.
    pub(crate) fn append(&mut self, candles: Vec<Candle>) {
        self.candles.extend(candles);
        self.reindex();
    }

    /// Drops candles from the end until at most `max_len` remain.
    ///
    /// Returns the number dropped.
    pub(crate) fn trim_back(&mut self, max_len: usize) -> usize {
        let excess = self.candles.len().saturating_sub(max_len);
        self.candles.truncate(self.candles.len() - excess);
        excess
    }

    /// Drops candles from the start until at most `max_len` remain, advancing
    /// the logical offset past them.
    ///
    /// Returns the number dropped.
    pub(crate) fn trim_front(&mut self, max_len: usize) -> usize {
        let excess = self.candles.len().saturating_sub(max_len);
        if excess > 0 {
            self.candles.drain(..excess);
            self.logical_offset += excess;
            self.reindex();
        }
        excess
    }

    fn reindex(&mut self) {
        for (index, candle) in self.candles.iter_mut().enumerate() {
            candle.sequence_index = index;
        }
    }

    /// Checks the size and bounds invariants against `max_len`.
    pub fn is_within_bounds(&self, max_len: usize) -> bool {
        self.candles.len() <= max_len && self.end_offset() <= self.total_count
    }
}
