use crate::config::EngineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::StationEntry;
use crate::processors::hashing::{HashFn, ProbeStrategy};
use crate::utils::constants::MAX_STATION_NAME_LEN;

#[derive(Debug, Clone, Copy)]
struct Slot {
    hash: u64,
    key_start: usize,
    key_len: usize,
    entry: StationEntry,
}

/// Collision counters for measuring a hash policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    pub lookups: u64,
    /// Extra slots inspected beyond the home slot, summed over all lookups.
    pub total_probes: u64,
    pub longest_probe: usize,
}

impl ProbeStats {
    #[inline]
    fn observe(&mut self, probes: usize) {
        self.lookups += 1;
        self.total_probes += probes as u64;
        if probes > self.longest_probe {
            self.longest_probe = probes;
        }
    }

    pub fn combine(&mut self, other: &ProbeStats) {
        self.lookups += other.lookups;
        self.total_probes += other.total_probes;
        self.longest_probe = self.longest_probe.max(other.longest_probe);
    }

    pub fn average_probe(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.total_probes as f64 / self.lookups as f64
        }
    }
}

/// Fixed-capacity open-addressed map from station name to aggregate.
///
/// The slot array and key arena are allocated once; recording a value never
/// allocates. The table never grows: a station beyond `limit` is a
/// [`ProcessingError::Capacity`].
pub struct StationTable {
    slots: Vec<Option<Slot>>,
    keys: Vec<u8>,
    mask: usize,
    len: usize,
    limit: usize,
    hash: HashFn,
    probe: ProbeStrategy,
    stats: ProbeStats,
}

impl StationTable {
    /// `slot_count` must be a power of two greater than `limit` so that a
    /// probe sequence always reaches an empty slot.
    pub fn new(limit: usize, slot_count: usize, hash: HashFn, probe: ProbeStrategy) -> Result<Self> {
        if !slot_count.is_power_of_two() || slot_count <= limit {
            return Err(ProcessingError::Config(format!(
                "station table needs a power-of-two slot count above {}, got {}",
                limit, slot_count
            )));
        }

        Ok(Self {
            slots: vec![None; slot_count],
            keys: Vec::with_capacity(limit.saturating_mul(MAX_STATION_NAME_LEN)),
            mask: slot_count - 1,
            len: 0,
            limit,
            hash,
            probe,
            stats: ProbeStats::default(),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            config.max_stations,
            config.table_slots()?,
            config.hash.function(),
            config.probe,
        )
    }

    /// Add one observation for `name`, inserting the station on first sight.
    #[inline]
    pub fn record(&mut self, name: &[u8], value: i32) -> Result<()> {
        let hash = (self.hash)(name);
        let (index, found, probes) = self.find_slot(name, hash);
        self.stats.observe(probes);

        if found {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.entry.record(value);
            }
            return Ok(());
        }

        self.insert_at(index, name, hash, StationEntry::from_value(value))
    }

    /// Fold a partial aggregate for `name` into the table.
    pub fn merge_entry(&mut self, name: &[u8], entry: &StationEntry) -> Result<()> {
        let hash = (self.hash)(name);
        let (index, found, probes) = self.find_slot(name, hash);
        self.stats.observe(probes);

        if found {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.entry.merge(entry);
            }
            return Ok(());
        }

        self.insert_at(index, name, hash, *entry)
    }

    pub fn get(&self, name: &[u8]) -> Option<&StationEntry> {
        let hash = (self.hash)(name);
        match self.find_slot(name, hash) {
            (index, true, _) => self.slots[index].as_ref().map(|slot| &slot.entry),
            _ => None,
        }
    }

    /// Occupied slots in slot order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &StationEntry)> + '_ {
        self.slots
            .iter()
            .flatten()
            .map(move |slot| (self.key(slot), &slot.entry))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distinct stations accepted before failing.
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn probe_stats(&self) -> ProbeStats {
        self.stats
    }

    #[inline]
    fn key(&self, slot: &Slot) -> &[u8] {
        &self.keys[slot.key_start..slot.key_start + slot.key_len]
    }

    /// Returns the slot holding `name`, or the empty slot where it belongs,
    /// plus the number of extra slots inspected.
    #[inline]
    fn find_slot(&self, name: &[u8], hash: u64) -> (usize, bool, usize) {
        // fold the high bits in; some policies have weak low bits
        let mut index = ((hash ^ (hash >> 32)) as usize) & self.mask;
        let mut attempt = 0;

        loop {
            match &self.slots[index] {
                None => return (index, false, attempt),
                Some(slot) if slot.hash == hash && self.key(slot) == name => {
                    return (index, true, attempt)
                }
                Some(_) => {
                    attempt += 1;
                    index = self.probe.next(index, attempt, self.mask);
                }
            }
        }
    }

    fn insert_at(&mut self, index: usize, name: &[u8], hash: u64, entry: StationEntry) -> Result<()> {
        if self.len >= self.limit {
            return Err(ProcessingError::Capacity { limit: self.limit });
        }

        let key_start = self.keys.len();
        self.keys.extend_from_slice(name);
        self.slots[index] = Some(Slot {
            hash,
            key_start,
            key_len: name.len(),
            entry,
        });
        self.len += 1;
        Ok(())
    }
}

impl std::fmt::Debug for StationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationTable")
            .field("len", &self.len)
            .field("limit", &self.limit)
            .field("slots", &self.slots.len())
            .field("probe", &self.probe)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::hashing::{fnv1a, HashPolicy};

    fn constant_hash(_: &[u8]) -> u64 {
        42
    }

    #[test]
    fn test_record_and_update() -> Result<()> {
        let mut table = StationTable::new(16, 64, fnv1a, ProbeStrategy::Linear)?;
        table.record(b"Oslo", 105)?;
        table.record(b"Oslo", -23)?;
        table.record(b"Paris", 200)?;

        assert_eq!(table.len(), 2);
        let oslo = table.get(b"Oslo").unwrap();
        assert_eq!(oslo.count, 2);
        assert_eq!(oslo.sum, 82);
        assert_eq!(oslo.min, -23);
        assert_eq!(oslo.max, 105);
        assert!(table.get(b"Bergen").is_none());
        Ok(())
    }

    #[test]
    fn test_full_collisions_still_distinguish_keys() -> Result<()> {
        for probe in [ProbeStrategy::Linear, ProbeStrategy::Quadratic] {
            let mut table = StationTable::new(10, 16, constant_hash, probe)?;
            for i in 0..10 {
                let name = format!("station-{i}");
                table.record(name.as_bytes(), i)?;
                table.record(name.as_bytes(), i * 2)?;
            }

            assert_eq!(table.len(), 10);
            for i in 0..10 {
                let entry = table.get(format!("station-{i}").as_bytes()).unwrap();
                assert_eq!(entry.count, 2);
                assert_eq!(entry.sum, (i * 3) as i64);
            }
            assert!(table.probe_stats().longest_probe >= 9);
        }
        Ok(())
    }

    #[test]
    fn test_capacity_exceeded() -> Result<()> {
        let mut table = StationTable::new(3, 8, fnv1a, ProbeStrategy::Linear)?;
        table.record(b"a", 1)?;
        table.record(b"b", 1)?;
        table.record(b"c", 1)?;
        // existing keys still update at the limit
        table.record(b"a", 2)?;

        let err = table.record(b"d", 1).unwrap_err();
        assert!(matches!(err, ProcessingError::Capacity { limit: 3 }));
        assert_eq!(table.len(), 3);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_slot_count() {
        assert!(StationTable::new(8, 8, fnv1a, ProbeStrategy::Linear).is_err());
        assert!(StationTable::new(8, 24, fnv1a, ProbeStrategy::Linear).is_err());
    }

    #[test]
    fn test_merge_entry_and_iter() -> Result<()> {
        let config = EngineConfig {
            max_stations: 100,
            hash: HashPolicy::Fx,
            ..EngineConfig::default()
        };
        let mut table = StationTable::from_config(&config)?;
        table.record(b"Oslo", 10)?;
        table.merge_entry(b"Oslo", &StationEntry::from_value(-50))?;
        table.merge_entry(b"Rome", &StationEntry::from_value(300))?;

        let mut names: Vec<Vec<u8>> = table.iter().map(|(name, _)| name.to_vec()).collect();
        names.sort();
        assert_eq!(names, vec![b"Oslo".to_vec(), b"Rome".to_vec()]);
        assert_eq!(table.get(b"Oslo").unwrap().min, -50);
        assert_eq!(table.slot_count(), 512);
        Ok(())
    }
}
