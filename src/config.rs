use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::processors::hashing::{HashPolicy, ProbeStrategy};
use crate::utils::constants::{
    DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE, DEFAULT_HEADROOM, DEFAULT_MAX_STATIONS,
    ENV_PREFIX, MIN_BUFFER_SIZE,
};

/// Construction-time settings for a run. Nothing here changes once the
/// coordinator exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    #[validate(range(min = 1))]
    pub workers: usize,

    /// Number of reusable read buffers; bounds peak memory with `buffer_size`.
    #[validate(range(min = 1))]
    pub buffer_count: usize,

    pub buffer_size: usize,

    /// Distinct stations a worker table accepts before failing.
    #[validate(range(min = 1))]
    pub max_stations: usize,

    /// Slots per expected station.
    #[validate(range(min = 1.0))]
    pub headroom: f64,

    pub hash: HashPolicy,

    pub probe: ProbeStrategy,
}

impl EngineConfig {
    /// Defaults with an explicit worker count.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Layer an optional config file and `BRC_*` environment variables over
    /// the defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Field ranges plus the cross-field rules the derive cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(ProcessingError::Config(format!(
                "buffer_size {} is below the minimum of {} bytes",
                self.buffer_size, MIN_BUFFER_SIZE
            )));
        }

        self.table_slots().map(|_| ())
    }

    /// Slot count for a station table: the station limit scaled by the
    /// headroom, rounded up to a power of two, always with one free slot.
    pub fn table_slots(&self) -> Result<usize> {
        let scaled = (self.max_stations as f64 * self.headroom).ceil();
        if !scaled.is_finite() || scaled >= usize::MAX as f64 {
            return Err(ProcessingError::Config(format!(
                "station table of {} x {} slots is too large",
                self.max_stations, self.headroom
            )));
        }

        (scaled as usize)
            .max(self.max_stations + 1)
            .checked_next_power_of_two()
            .ok_or_else(|| ProcessingError::Config("station table size overflows".to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            buffer_count: DEFAULT_BUFFER_COUNT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_stations: DEFAULT_MAX_STATIONS,
            headroom: DEFAULT_HEADROOM,
            hash: HashPolicy::default(),
            probe: ProbeStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.check().is_ok());
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_table_slots_power_of_two() {
        let config = EngineConfig {
            max_stations: 10_000,
            headroom: 4.0,
            ..EngineConfig::default()
        };
        assert_eq!(config.table_slots().unwrap(), 65_536);

        let tight = EngineConfig {
            max_stations: 8,
            headroom: 1.0,
            ..EngineConfig::default()
        };
        // one slot always stays free
        assert_eq!(tight.table_slots().unwrap(), 16);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = EngineConfig::with_workers(0);
        assert!(matches!(config.check(), Err(ProcessingError::Validation(_))));

        let config = EngineConfig {
            headroom: 0.5,
            ..EngineConfig::default()
        };
        assert!(matches!(config.check(), Err(ProcessingError::Validation(_))));

        let config = EngineConfig {
            buffer_size: 16,
            ..EngineConfig::default()
        };
        assert!(matches!(config.check(), Err(ProcessingError::Config(_))));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "workers = 3")?;
        writeln!(file, "buffer_size = 65536")?;
        writeln!(file, "hash = \"djb2\"")?;
        writeln!(file, "probe = \"quadratic\"")?;

        let config = EngineConfig::load(Some(file.path()))?;

        assert_eq!(config.workers, 3);
        assert_eq!(config.buffer_size, 65_536);
        assert_eq!(config.hash, HashPolicy::Djb2);
        assert_eq!(config.probe, ProbeStrategy::Quadratic);
        assert_eq!(config.max_stations, DEFAULT_MAX_STATIONS);
        Ok(())
    }
}
