use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;

/// Account-level holder counts reported by the backing service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub primary_holders: u64,
    pub primary_holder_quota: u64,
    pub secondary_holders: u64,
    pub secondary_holder_quota: u64,
}

/// Estimated store occupancy.
///
/// The byte figures are upper bounds that assume every holder is packed to
/// its tier's capacity. The service does not expose document sizes, and it
/// counts holders created by anything else on the account too, so these
/// numbers are estimates and never exact measurements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Primary holders in use; one per stored record.
    pub object_count: u64,
    /// Primary holders the account may create.
    pub object_quota: u64,
    pub secondary_holders: u64,
    pub secondary_holder_quota: u64,
    pub estimated_bytes_used: u64,
    pub estimated_bytes_max: u64,
}

impl UsageReport {
    pub fn estimate(summary: &AccountSummary, config: &StoreConfig) -> Self {
        let primary_cap = config.primary_capacity as u64;
        let secondary_cap = config.secondary_capacity as u64;
        let bytes = |primary: u64, secondary: u64| {
            primary
                .saturating_mul(primary_cap)
                .saturating_add(secondary.saturating_mul(secondary_cap))
        };
        Self {
            object_count: summary.primary_holders,
            object_quota: summary.primary_holder_quota,
            secondary_holders: summary.secondary_holders,
            secondary_holder_quota: summary.secondary_holder_quota,
            estimated_bytes_used: bytes(summary.primary_holders, summary.secondary_holders),
            estimated_bytes_max: bytes(
                summary.primary_holder_quota,
                summary.secondary_holder_quota,
            ),
        }
    }
}

impl std::fmt::Display for UsageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Objects: {} / {}", self.object_count, self.object_quota)?;
        write!(
            f,
            "Bytes: {} / {} bytes (estimated)",
            self.estimated_bytes_used, self.estimated_bytes_max
        )
    }
}
