/// Record format
pub const MAX_STATION_NAME_LEN: usize = 100;
pub const FIELD_DELIMITER: u8 = b';';
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest value a well-formed line can carry in practice ("-999.9")
pub const MAX_VALUE_LEN: usize = 6;

/// Largest magnitude a value may have, in tenths (999.9)
pub const MAX_ABS_TENTHS: i32 = 9_999;

/// Smallest buffer that can hold one maximal line plus its terminator
pub const MIN_BUFFER_SIZE: usize = MAX_STATION_NAME_LEN + 1 + MAX_VALUE_LEN + 1;

/// Station table sizing
pub const DEFAULT_MAX_STATIONS: usize = 10_000;
pub const DEFAULT_HEADROOM: f64 = 4.0;

/// Reader defaults
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB
pub const DEFAULT_BUFFER_COUNT: usize = 16;

/// Fixed-point sentinels for an entry with no observations
pub const MIN_SENTINEL: i32 = i32::MAX;
pub const MAX_SENTINEL: i32 = i32::MIN;

/// Environment prefix for configuration overrides (BRC_WORKERS=8)
pub const ENV_PREFIX: &str = "BRC";

/// Progress refresh interval while waiting for workers
pub const PROGRESS_POLL_MS: u64 = 100;
