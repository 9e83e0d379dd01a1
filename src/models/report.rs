use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::StationEntry;
use crate::utils::fixed_point::{mean_tenths, tenths_to_f64, write_tenths};

/// Final min/mean/max for one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSummary {
    pub name: String,
    pub min_tenths: i64,
    pub mean_tenths: i64,
    pub max_tenths: i64,
    pub count: u64,
}

impl StationSummary {
    /// The parser only admits UTF-8 names, so the lossy conversion is exact
    /// for anything read from input and byte order matches `name` order.
    pub fn from_entry(name: &[u8], entry: &StationEntry) -> Self {
        Self {
            name: String::from_utf8_lossy(name).into_owned(),
            min_tenths: entry.min as i64,
            mean_tenths: mean_tenths(entry.sum, entry.count),
            max_tenths: entry.max as i64,
            count: entry.count,
        }
    }

    pub fn min(&self) -> f64 {
        tenths_to_f64(self.min_tenths)
    }

    pub fn mean(&self) -> f64 {
        tenths_to_f64(self.mean_tenths)
    }

    pub fn max(&self) -> f64 {
        tenths_to_f64(self.max_tenths)
    }

    /// `name=min/mean/max`
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(self.name.len() + 20);
        line.push_str(&self.name);
        line.push('=');
        write_tenths(&mut line, self.min_tenths);
        line.push('/');
        write_tenths(&mut line, self.mean_tenths);
        line.push('/');
        write_tenths(&mut line, self.max_tenths);
        line
    }
}

impl std::fmt::Display for StationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Merged result of a run, one summary per station sorted by name bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationReport {
    pub stations: Vec<StationSummary>,
    pub total_records: u64,
}

impl StationReport {
    /// Build a report from merged entries. BTreeMap order over raw bytes is
    /// the output order.
    pub fn from_merged(merged: &BTreeMap<Vec<u8>, StationEntry>) -> Self {
        let stations: Vec<StationSummary> = merged
            .iter()
            .map(|(name, entry)| StationSummary::from_entry(name, entry))
            .collect();
        let total_records = merged.values().map(|e| e.count).sum();

        Self {
            stations,
            total_records,
        }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&StationSummary> {
        self.stations
            .binary_search_by(|s| s.name.as_bytes().cmp(name.as_bytes()))
            .ok()
            .map(|idx| &self.stations[idx])
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.stations.iter().map(StationSummary::to_line)
    }
}
