//! Live/replay display mode and the cursor into the tick buffer.
//!
//! The controller never holds a tick; it only says which buffer index is
//! on screen. In live mode that index is derived from the buffer length,
//! so every append moves the frame forward with no bookkeeping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    #[default]
    Live,
    Replay,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayController {
    mode:   ReplayMode,
    /// Frozen index; meaningful only in replay mode.
    frozen: usize,
}

impl ReplayController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    /// Index of the displayed tick for a buffer of length `len`.
    /// Always within `[0, len - 1]`; `None` when the buffer is empty.
    pub fn cursor(&self, len: usize) -> Option<usize> {
        let last = len.checked_sub(1)?;
        Some(match self.mode {
            ReplayMode::Live   => last,
            ReplayMode::Replay => self.frozen.min(last),
        })
    }

    pub fn set_mode(&mut self, mode: ReplayMode, len: usize) {
        match mode {
            ReplayMode::Live   => self.enter_live(),
            ReplayMode::Replay => self.enter_replay(len),
        }
    }

    /// Freeze at whatever is on screen right now.
    pub fn enter_replay(&mut self, len: usize) {
        if self.mode == ReplayMode::Replay {
            return;
        }
        self.frozen = self.cursor(len).unwrap_or(0);
        self.mode = ReplayMode::Replay;
    }

    /// Re-snap to the newest tick.
    pub fn enter_live(&mut self) {
        self.mode = ReplayMode::Live;
        self.frozen = 0;
    }

    /// Scrub to `index`, clamped into range. Refused outside replay mode
    /// or when there is nothing to scrub between.
    pub fn seek(&mut self, index: usize, len: usize) -> bool {
        if self.mode != ReplayMode::Replay || len <= 1 {
            return false;
        }
        self.frozen = index.min(len - 1);
        true
    }

    /// Seek relative to the current cursor.
    pub fn step(&mut self, delta: i64, len: usize) -> bool {
        let Some(current) = self.cursor(len) else {
            return false;
        };
        let target = if delta.is_negative() {
            current.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            current.saturating_add(delta as usize)
        };
        self.seek(target, len)
    }

    /// The buffer dropped its head. Keep the frozen frame pointing at the
    /// same tick until that tick itself is gone.
    pub fn on_head_evicted(&mut self) {
        if self.mode == ReplayMode::Replay {
            self.frozen = self.frozen.saturating_sub(1);
        }
    }
}
