//! Shared primitive types used across the replay client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned run identifier.
pub type RunId = String;

/// Server-assigned scenario identifier.
pub type ScenarioId = String;

/// Monotonic activation counter. Bumped every time the view switches runs;
/// any result carrying an older epoch is stale.
pub type Epoch = u64;

/// One cell on the warehouse grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Heatmap key used by the simulation service: `"x:y"`.
    pub fn cell_key(&self) -> String {
        format!("{}:{}", self.x, self.y)
    }

    /// Parse a heatmap key back into a position.
    pub fn parse_cell_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(':')?;
        Some(Self {
            x: x.trim().parse().ok()?,
            y: y.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_key_parses_back() {
        let pos = GridPosition::new(12, 3);
        assert_eq!(GridPosition::parse_cell_key(&pos.cell_key()), Some(pos));
    }

    #[test]
    fn malformed_cell_keys_are_rejected() {
        assert_eq!(GridPosition::parse_cell_key("12"), None);
        assert_eq!(GridPosition::parse_cell_key("a:b"), None);
        assert_eq!(GridPosition::parse_cell_key(""), None);
    }
}
