//! Application-wide constants and default values
//!
//! Centralizes magic numbers and default configurations for better maintainability

/// Monitor loop defaults
pub mod monitor {
    /// Interval between two monitor ticks (seconds)
    pub const DEFAULT_INTERVAL_SECS: u64 = 10;

    /// Consecutive restart failures after which auto-restart is disabled
    pub const FAIL_THRESHOLD: u32 = 3;
}

/// Event fan-out configuration
pub mod events {
    /// Capacity of each subscriber mailbox
    pub const MAILBOX_CAPACITY: usize = 10;

    /// Interval between SSE keep-alive comments (seconds)
    pub const KEEP_ALIVE_SECS: u64 = 15;

    /// File name prefix of the rotated event journal
    pub const JOURNAL_FILE_PREFIX: &str = "events.jsonl";
}

/// Service controller defaults
pub mod controller {
    /// Upper bound for a single invocation of the platform service CLI (seconds)
    pub const COMMAND_TIMEOUT_SECS: u64 = 30;

    /// How long a Windows start/stop waits for the target state (seconds)
    pub const STATE_WAIT_TIMEOUT_SECS: u64 = 20;

    /// Poll period while waiting for a target state (milliseconds)
    pub const STATE_POLL_MILLIS: u64 = 200;

    /// Pause between the stop and start halves of a Windows restart (milliseconds)
    pub const RESTART_PAUSE_MILLIS: u64 = 500;
}
