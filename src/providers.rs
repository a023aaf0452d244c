//! Injection seams for ambient state.
//!
//! Chat history stamps each save with the current time; routing that
//! through a trait keeps history tests deterministic.

/// Source of Unix timestamps.
///
/// ```
/// use llm_tool::providers::{SystemTimeProvider, TimeProvider};
///
/// assert!(SystemTimeProvider.now() > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Current Unix timestamp in seconds.
    fn now(&self) -> u64;
}

/// Wall-clock time.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Fixed time, for tests.
pub struct FixedTimeProvider(pub u64);

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> u64 {
        self.0
    }
}
