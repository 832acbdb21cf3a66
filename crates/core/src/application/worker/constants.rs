// Worker constants
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default recovery window for orphaned jobs (5 minutes)
pub const DEFAULT_RECOVERY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Attempts at persisting a terminal outcome before giving up
pub const OUTCOME_WRITE_ATTEMPTS: u32 = 6;

/// First back-off between outcome write attempts; doubles up to ERROR_RECOVERY_SLEEP_DURATION
pub const OUTCOME_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(50);
