use std::env;

use chrono::Duration;
use daywise_core::cache::{MergePolicy, PlanOptions};

/// Store configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Seconds before a loaded day is refetched (default: 300, 0 disables)
    pub stale_seconds: u64,
    /// Maximum days per API request (default: unlimited)
    pub max_days_fetch: Option<usize>,
    /// Keep late responses invalid when the day changed meanwhile (default: false)
    pub reject_stale_merges: bool,
    /// Capacity of the background worker channel (default: 64)
    pub worker_queue: usize,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DAYWISE_STALE_SECONDS` - Staleness TTL in seconds (default: 300)
    /// - `DAYWISE_MAX_DAYS_FETCH` - Days per request (default: unset)
    /// - `DAYWISE_REJECT_STALE_MERGES` - `true`/`1` to enable (default: false)
    /// - `DAYWISE_WORKER_QUEUE` - Worker channel capacity (default: 64)
    pub fn from_env() -> Self {
        Self {
            stale_seconds: env::var("DAYWISE_STALE_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            max_days_fetch: env::var("DAYWISE_MAX_DAYS_FETCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|days| *days > 0),
            reject_stale_merges: env::var("DAYWISE_REJECT_STALE_MERGES")
                .ok()
                .is_some_and(|v| is_truthy(&v)),
            worker_queue: env::var("DAYWISE_WORKER_QUEUE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(64),
        }
    }

    /// Staleness TTL, `None` when disabled.
    pub fn stale_after(&self) -> Option<Duration> {
        if self.stale_seconds == 0 {
            return None;
        }
        i64::try_from(self.stale_seconds)
            .ok()
            .and_then(Duration::try_seconds)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            stale_after: self.stale_after(),
            max_days_fetch: self.max_days_fetch,
        }
    }

    pub fn merge_policy(&self) -> MergePolicy {
        if self.reject_stale_merges {
            MergePolicy::RejectStale
        } else {
            MergePolicy::AcceptLate
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}
