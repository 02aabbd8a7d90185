use serde::{Deserialize, Serialize};

/// Snapshot of the singleton redemption counters record.
///
/// Both fields only ever grow while the service runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionCounters {
    pub success_count: u64,
    pub fail_count: u64,
}

impl RedemptionCounters {
    pub fn new(success_count: u64, fail_count: u64) -> Self {
        Self {
            success_count,
            fail_count,
        }
    }

    pub fn total(&self) -> u64 {
        self.success_count + self.fail_count
    }
}
