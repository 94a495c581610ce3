use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, RecordMarker};
use crate::error::{StoreError, StoreResult};
use crate::holder::{HolderKind, HolderRef};

/// Trust document attached to every secondary holder. The backing service
/// refuses to create that holder kind without one; its content is never read.
pub const DEFAULT_TRUST_DOCUMENT: &str = r#"{"Version":"2012-10-17","Statement":{"Effect":"Allow","Principal":{"Service":"iam.amazonaws.com"},"Action":"sts:AssumeRole"}}"#;

/// Layout and naming configuration for a [`TieredStore`](crate::TieredStore).
///
/// Capacities are fixed at construction and measured in UTF-8 bytes. They sit
/// below the service's hard document limits so the envelope always fits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum payload bytes carried by a primary holder.
    pub primary_capacity: usize,
    /// Maximum payload bytes carried by a secondary holder.
    pub secondary_capacity: usize,
    /// Hard size limit the service enforces on a primary document.
    pub primary_document_limit: usize,
    /// Hard size limit the service enforces on a secondary document.
    pub secondary_document_limit: usize,
    /// Prepended to the key to name its primary holder.
    pub primary_prefix: String,
    /// Prepended to the key to name its secondary holder.
    pub secondary_prefix: String,
    /// Name of the document slot on each holder.
    pub document_name: String,
    /// Trust document supplied when creating a secondary holder.
    pub trust_document: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_capacity: 1500,
            secondary_capacity: 9800,
            primary_document_limit: 2048,
            secondary_document_limit: 10240,
            primary_prefix: "u-".into(),
            secondary_prefix: "r-".into(),
            document_name: "data".into(),
            trust_document: DEFAULT_TRUST_DOCUMENT.into(),
        }
    }
}

impl StoreConfig {
    /// Payload capacity of one tier.
    pub fn capacity(&self, kind: HolderKind) -> usize {
        match kind {
            HolderKind::Primary => self.primary_capacity,
            HolderKind::Secondary => self.secondary_capacity,
        }
    }

    /// Document size limit of one tier.
    pub fn document_limit(&self, kind: HolderKind) -> usize {
        match kind {
            HolderKind::Primary => self.primary_document_limit,
            HolderKind::Secondary => self.secondary_document_limit,
        }
    }

    /// Largest value the store accepts.
    pub fn max_value_len(&self) -> usize {
        self.primary_capacity + self.secondary_capacity
    }

    /// Holder addressing `key` in the given tier.
    pub fn holder(&self, kind: HolderKind, key: &str) -> HolderRef {
        let prefix = match kind {
            HolderKind::Primary => &self.primary_prefix,
            HolderKind::Secondary => &self.secondary_prefix,
        };
        HolderRef::new(kind, format!("{prefix}{key}"), self.document_name.as_str())
    }

    /// Check the configuration for internal consistency.
    ///
    /// Besides the ordering of the two capacities, this encodes a worst-case
    /// envelope for each tier (a full chunk of unescaped characters, plus the
    /// record marker on the primary tier) and requires it to fit the tier's
    /// document limit.
    pub fn validate(&self) -> StoreResult<()> {
        if self.primary_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "primary_capacity must be non-zero".into(),
            ));
        }
        if self.primary_capacity >= self.secondary_capacity {
            return Err(StoreError::InvalidConfig(format!(
                "primary_capacity ({}) must be smaller than secondary_capacity ({})",
                self.primary_capacity, self.secondary_capacity
            )));
        }
        if self.primary_prefix.is_empty() || self.secondary_prefix.is_empty() {
            return Err(StoreError::InvalidConfig(
                "holder prefixes must be non-empty".into(),
            ));
        }
        if self.primary_prefix == self.secondary_prefix {
            return Err(StoreError::InvalidConfig(
                "primary and secondary prefixes must differ".into(),
            ));
        }
        if self.document_name.is_empty() {
            return Err(StoreError::InvalidConfig(
                "document_name must be non-empty".into(),
            ));
        }
        serde_json::from_str::<serde_json::Value>(&self.trust_document).map_err(|e| {
            StoreError::InvalidConfig(format!("trust_document is not valid JSON: {e}"))
        })?;

        for kind in [HolderKind::Primary, HolderKind::Secondary] {
            let filler = "x".repeat(self.capacity(kind));
            let marker = match kind {
                HolderKind::Primary => Some(RecordMarker {
                    total_len: self.max_value_len(),
                    crc: u32::MAX,
                }),
                HolderKind::Secondary => None,
            };
            let size = Envelope::wrap(&filler, marker).encode()?.len();
            let limit = self.document_limit(kind);
            if size > limit {
                return Err(StoreError::InvalidConfig(format!(
                    "{kind} capacity {} needs a {size} byte document, limit is {limit}",
                    self.capacity(kind)
                )));
            }
        }
        Ok(())
    }
}
