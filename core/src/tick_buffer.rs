//! Bounded, ordered store of received ticks.
//!
//! RULE: append-only at the tail, eviction only at the head.
//! Nothing reorders or removes ticks any other way.

use crate::model::Tick;
use std::collections::VecDeque;

pub const DEFAULT_TICK_CAPACITY: usize = 900;

#[derive(Debug, Clone)]
pub struct TickBuffer {
    ticks:    VecDeque<Tick>,
    capacity: usize,
    /// Total ticks ever appended, including evicted ones.
    appended: u64,
}

impl TickBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ticks: VecDeque::with_capacity(capacity.min(DEFAULT_TICK_CAPACITY)),
            capacity,
            appended: 0,
        }
    }

    /// Insert at the tail. At capacity the oldest tick is evicted first
    /// and handed back to the caller.
    pub fn append(&mut self, tick: Tick) -> Option<Tick> {
        let evicted = if self.ticks.len() >= self.capacity {
            self.ticks.pop_front()
        } else {
            None
        };
        self.ticks.push_back(tick);
        self.appended += 1;
        evicted
    }

    /// Tick at `index`, or the nearest valid one. `None` only when empty.
    pub fn get(&self, index: usize) -> Option<&Tick> {
        let last = self.last_index()?;
        self.ticks.get(index.min(last))
    }

    pub fn last(&self) -> Option<&Tick> {
        self.ticks.back()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.ticks.len().checked_sub(1)
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ticks appended over the lifetime of this buffer.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    /// Ticks dropped by eviction so far.
    pub fn total_evicted(&self) -> u64 {
        self.appended - self.ticks.len() as u64
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Tick> {
        self.ticks.iter()
    }
}

impl Default for TickBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_CAPACITY)
    }
}
