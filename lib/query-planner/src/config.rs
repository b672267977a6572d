use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PlannerConfig {
    /// The maximum time the planner may spend on a single operation.
    /// When the timeout is reached, planning is cancelled and the result is not cached.
    ///
    /// Default: 10s.
    #[serde(
        default = "default_planning_timeout",
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize"
    )]
    pub timeout: Duration,
    /// Number of plans kept in the plan cache.
    ///
    /// Default: 1000.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timeout: default_planning_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_planning_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_cache_capacity() -> u64 {
    1000
}
