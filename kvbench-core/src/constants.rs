use std::ops::RangeInclusive;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_DATABASE: u8 = 0;
pub const DEFAULT_TEST_DURATION_SECS: u32 = 30;
pub const DEFAULT_CONCURRENCY: u32 = 50;
pub const DEFAULT_KEY_SIZE: usize = 64;
pub const DEFAULT_VALUE_SIZE: usize = 1024;

pub const PORT_RANGE: RangeInclusive<i64> = 1..=65535;
pub const DATABASE_RANGE: RangeInclusive<i64> = 0..=15;
pub const TEST_DURATION_RANGE: RangeInclusive<i64> = 1..=300;
pub const CONCURRENCY_RANGE: RangeInclusive<i64> = 1..=1000;
pub const KEY_SIZE_RANGE: RangeInclusive<i64> = 1..=1024;
pub const VALUE_SIZE_RANGE: RangeInclusive<i64> = 1..=10240;

/// Fixed estimate used to turn the test duration into an iteration budget.
///
/// The run is bounded by iteration count, never by wall-clock time.
pub const ITERATIONS_PER_SECOND: u64 = 1000;

/// Iteration progress is reported whenever `index % PROGRESS_INTERVAL == 0`.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Number of hash fields grouped under a single hash key.
pub const FIELDS_PER_HASH: u64 = 10;

/// Prefix of every key a session writes; the session id is appended.
pub const KEY_PREFIX: &str = "perf_test";

/// Maximum number of errors listed in a rendered report.
pub const REPORT_MAX_ERRORS: usize = 10;
