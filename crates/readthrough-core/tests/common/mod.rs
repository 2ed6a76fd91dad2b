#![allow(dead_code)]
use std::time::Duration;

use readthrough_core::CachePolicy;

/// Policy with short intervals, for tests that let records go stale.
pub fn short_policy() -> CachePolicy {
    CachePolicy::new(
        Duration::from_millis(100),
        Duration::from_secs(60),
        Duration::from_secs(1),
    )
}
