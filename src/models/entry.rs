use serde::{Deserialize, Serialize};

use crate::utils::constants::{MAX_SENTINEL, MIN_SENTINEL};

/// Running aggregate for one station, in tenths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationEntry {
    pub sum: i64,
    pub count: u64,
    pub min: i32,
    pub max: i32,
}

impl StationEntry {
    pub fn new() -> Self {
        Self {
            sum: 0,
            count: 0,
            min: MIN_SENTINEL,
            max: MAX_SENTINEL,
        }
    }

    /// Entry holding a single observation.
    pub fn from_value(value: i32) -> Self {
        let mut entry = Self::new();
        entry.record(value);
        entry
    }

    #[inline]
    pub fn record(&mut self, value: i32) {
        self.count += 1;
        self.sum += value as i64;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Fold another partial aggregate for the same station into this one.
    pub fn merge(&mut self, other: &StationEntry) {
        self.sum += other.sum;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for StationEntry {
    fn default() -> Self {
        Self::new()
    }
}
