//! Bounded log of discrete run events, merged tick by tick.
//!
//! Storage is oldest-first so eviction is a head pop; callers that
//! display the log read it most-recent-first.

use crate::model::TimelineEvent;
use std::collections::VecDeque;

pub const DEFAULT_TIMELINE_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct Timeline {
    events:   VecDeque<TimelineEvent>,
    capacity: usize,
    merged:   bool,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            merged: false,
        }
    }

    /// Append a batch in received order, then trim the head back to capacity.
    /// A tick's `recent_events` are already time-ordered.
    pub fn merge<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = TimelineEvent>,
    {
        self.events.extend(batch);
        self.merged = true;
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Seed from a run's stored timeline. Only applies while nothing has
    /// been merged from the stream, so stored and streamed events never
    /// double up. Returns whether the seed was applied.
    pub fn seed(&mut self, stored: &[TimelineEvent]) -> bool {
        if self.merged || !self.events.is_empty() || stored.is_empty() {
            return false;
        }
        let skip = stored.len().saturating_sub(self.capacity);
        self.events.extend(stored[skip..].iter().cloned());
        true
    }

    /// Newest first, for display.
    pub fn recent_first(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter().rev()
    }

    /// Oldest first, storage order.
    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_TIMELINE_CAPACITY)
    }
}
