use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::delete::{DeleteOutcome, DeleteReport, DeleteTarget};
use crate::envelope::{DecodedChunk, Envelope, RecordMarker};
use crate::error::{BackingError, BackingResult, StoreError, StoreResult};
use crate::holder::{HolderKind, HolderRef};
use crate::layout::{Chunk, ChunkLayout};
use crate::traits::AttributeBackend;
use crate::usage::UsageReport;

/// Key-value store spread over primary and secondary holders.
///
/// Each call issues its backing requests one after another. The store keeps
/// no local state, so calls for different keys are independent. Calls for
/// the same key are not coordinated: the backing service decides which
/// write wins, and a `set` interrupted between its two writes leaves a
/// record that [`get`](Self::get) reports as incomplete.
pub struct TieredStore<B> {
    backend: B,
    config: StoreConfig,
}

impl<B: AttributeBackend> TieredStore<B> {
    /// Create a store after validating `config`.
    pub fn new(backend: B, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Create a store with [`StoreConfig::default`].
    pub fn with_defaults(backend: B) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the primary document is missing, unreadable or
    /// not shaped like an envelope. Records carrying a marker are checked
    /// against it, and a mismatch between the tiers is reported as
    /// [`StoreError::Incomplete`] or [`StoreError::Corrupt`] rather than
    /// returning partial data.
    ///
    /// Records without a marker fall back to the length rule: a primary chunk
    /// shorter than the primary capacity is the whole value, otherwise the
    /// secondary chunk is appended if it can be read. For such records a
    /// value of exactly the primary capacity picks up whatever secondary
    /// chunk is lying around.
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let primary_ref = self.config.holder(HolderKind::Primary, key);
        let Some(primary) = self.read_chunk(&primary_ref).await else {
            return Ok(None);
        };

        let value = match primary.marker {
            Some(marker) => self.assemble(key, primary.payload, marker).await?,
            None => self.assemble_unmarked(key, primary.payload).await,
        };
        Ok(Some(value))
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Nothing is sent to the backing service when the value is too large
    /// for the two tiers or an encoded document would exceed its tier's
    /// limit. Capacities count raw bytes, but the document limit applies to
    /// the JSON-escaped envelope: text dense in quotes, backslashes or
    /// control characters can be rejected with
    /// [`StoreError::DocumentTooLarge`] well below the tier capacity.
    ///
    /// Missing holders are created on the way; if creating one, or
    /// the write retried after creating it, fails the call returns
    /// [`StoreError::Provisioning`] and earlier writes are left in place.
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let layout = ChunkLayout::split(value, &self.config)?;
        let primary_doc = self.encode_chunk(&layout.primary, Some(layout.marker))?;
        let secondary_doc = layout
            .secondary
            .as_ref()
            .map(|chunk| self.encode_chunk(chunk, None))
            .transpose()?;

        let primary_ref = self.config.holder(HolderKind::Primary, key);
        self.write_chunk(&primary_ref, &primary_doc).await?;

        let secondary_ref = self.config.holder(HolderKind::Secondary, key);
        match secondary_doc {
            Some(doc) => self.write_chunk(&secondary_ref, &doc).await?,
            None => self.discard_stale_secondary(&secondary_ref).await,
        }

        debug!(
            key,
            len = value.len(),
            tiers = if layout.spans_both_tiers() { 2 } else { 1 },
            "stored record"
        );
        Ok(())
    }

    /// Remove every trace of `key`.
    ///
    /// Issues four removals in a fixed order (secondary document, primary
    /// document, secondary holder, primary holder). Removing the secondary
    /// chunk first narrows the window in which a concurrent reader could
    /// pair a live primary chunk with a stale secondary one. Each step runs
    /// regardless of the others; failures are logged and reported, never
    /// returned as errors.
    pub async fn delete(&self, key: &str) -> DeleteReport {
        let primary = self.config.holder(HolderKind::Primary, key);
        let secondary = self.config.holder(HolderKind::Secondary, key);
        let mut report = DeleteReport::default();

        for target in DeleteTarget::ORDER {
            let result = match target {
                DeleteTarget::SecondaryDocument => self.backend.delete_document(&secondary).await,
                DeleteTarget::PrimaryDocument => self.backend.delete_document(&primary).await,
                DeleteTarget::SecondaryHolder => self.backend.delete_holder(&secondary).await,
                DeleteTarget::PrimaryHolder => self.backend.delete_holder(&primary).await,
            };
            let outcome = DeleteOutcome::from_result(result);
            if let DeleteOutcome::Failed(reason) = &outcome {
                warn!(key, %target, %reason, "delete step failed");
            }
            report.push(target, outcome);
        }

        if report.is_clean() {
            debug!(key, "deleted record");
        }
        report
    }

    /// Estimate how much of the account's capacity is in use.
    ///
    /// See [`UsageReport`] for why the figures are upper bounds.
    pub async fn usage(&self) -> StoreResult<UsageReport> {
        let summary = self.backend.account_summary().await?;
        Ok(UsageReport::estimate(&summary, &self.config))
    }

    async fn assemble(
        &self,
        key: &str,
        primary: String,
        marker: RecordMarker,
    ) -> StoreResult<String> {
        if primary.len() >= marker.total_len {
            return self.verify(key, primary, marker);
        }

        let secondary_ref = self.config.holder(HolderKind::Secondary, key);
        let Some(secondary) = self.read_chunk(&secondary_ref).await else {
            warn!(
                key,
                expected = marker.total_len,
                found = primary.len(),
                "secondary chunk missing"
            );
            return Err(StoreError::Incomplete {
                key: key.to_string(),
                expected: marker.total_len,
                actual: primary.len(),
            });
        };

        let mut value = primary;
        value.push_str(&secondary.payload);
        self.verify(key, value, marker)
    }

    fn verify(&self, key: &str, value: String, marker: RecordMarker) -> StoreResult<String> {
        if value.len() != marker.total_len {
            warn!(key, expected = marker.total_len, found = value.len(), "record length mismatch");
            return Err(StoreError::Incomplete {
                key: key.to_string(),
                expected: marker.total_len,
                actual: value.len(),
            });
        }
        if !marker.matches(&value) {
            warn!(key, "record checksum mismatch");
            return Err(StoreError::Corrupt {
                key: key.to_string(),
            });
        }
        Ok(value)
    }

    async fn assemble_unmarked(&self, key: &str, primary: String) -> String {
        if primary.len() < self.config.primary_capacity {
            return primary;
        }
        let secondary_ref = self.config.holder(HolderKind::Secondary, key);
        match self.read_chunk(&secondary_ref).await {
            Some(secondary) => primary + &secondary.payload,
            None => primary,
        }
    }

    /// Fetch and decode one holder's chunk. Every failure reads as absent.
    async fn read_chunk(&self, holder: &HolderRef) -> Option<DecodedChunk> {
        let raw = match self.backend.get_document(holder).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                debug!(%holder, "no document");
                return None;
            }
            Err(e) => {
                warn!(%holder, error = %e, "document read failed");
                return None;
            }
        };
        match Envelope::decode(&raw).and_then(Envelope::into_chunk) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                warn!(%holder, error = %e, "undecodable document");
                None
            }
        }
    }

    fn encode_chunk(&self, chunk: &Chunk<'_>, marker: Option<RecordMarker>) -> StoreResult<String> {
        let doc = Envelope::wrap(chunk.payload, marker).encode()?;
        let limit = self.config.document_limit(chunk.tier);
        if doc.len() > limit {
            return Err(StoreError::DocumentTooLarge {
                tier: chunk.tier,
                size: doc.len(),
                limit,
            });
        }
        Ok(doc)
    }

    /// Write a document, creating the holder first if the service says it
    /// does not exist. The write is retried exactly once.
    async fn write_chunk(&self, holder: &HolderRef, document: &str) -> StoreResult<()> {
        match self.backend.put_document(holder, document).await {
            Ok(()) => return Ok(()),
            Err(BackingError::NoSuchEntity(_)) => {
                debug!(%holder, "holder missing; provisioning");
            }
            Err(e) => return Err(e.into()),
        }

        let provisioning = |source| StoreError::Provisioning {
            holder: holder.clone(),
            source,
        };
        self.ensure_holder(holder).await.map_err(provisioning)?;
        self.backend
            .put_document(holder, document)
            .await
            .map_err(provisioning)
    }

    /// Create `holder`, treating an existing one as success.
    async fn ensure_holder(&self, holder: &HolderRef) -> BackingResult<()> {
        let trust = holder
            .kind
            .requires_trust_document()
            .then_some(self.config.trust_document.as_str());
        match self.backend.create_holder(holder, trust).await {
            Ok(()) => {
                info!(%holder, "provisioned holder");
                Ok(())
            }
            Err(BackingError::EntityAlreadyExists(_)) => Ok(()),
            Err(e) => {
                warn!(%holder, error = %e, "holder provisioning failed");
                Err(e)
            }
        }
    }

    /// Drop a secondary chunk left behind by an earlier, longer value.
    async fn discard_stale_secondary(&self, holder: &HolderRef) {
        match self.backend.delete_document(holder).await {
            Ok(()) => debug!(%holder, "removed stale secondary chunk"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(%holder, error = %e, "could not remove stale secondary chunk"),
        }
    }
}

impl<B> std::fmt::Debug for TieredStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStore")
            .field("primary_capacity", &self.config.primary_capacity)
            .field("secondary_capacity", &self.config.secondary_capacity)
            .finish()
    }
}
