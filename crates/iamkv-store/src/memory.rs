use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::error::{BackingError, BackingResult};
use crate::holder::{HolderKind, HolderRef};
use crate::percent;
use crate::traits::AttributeBackend;
use crate::usage::AccountSummary;

/// A backing operation, for call accounting and fault injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackingOp {
    GetDocument,
    PutDocument,
    CreateHolder,
    DeleteDocument,
    DeleteHolder,
    AccountSummary,
}

/// Per-kind limits the in-memory service enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackingLimits {
    pub primary_holder_quota: u64,
    pub secondary_holder_quota: u64,
    pub primary_document_limit: usize,
    pub secondary_document_limit: usize,
}

impl Default for BackingLimits {
    fn default() -> Self {
        Self {
            primary_holder_quota: 5000,
            secondary_holder_quota: 1000,
            primary_document_limit: 2048,
            secondary_document_limit: 10240,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct HolderState {
    trust_document: Option<String>,
    documents: HashMap<String, String>,
}

struct Fault {
    op: BackingOp,
    kind: Option<HolderKind>,
    error: BackingError,
}

type HolderKey = (HolderKind, String);

/// In-memory model of the access-control service.
///
/// Intended for tests and the offline demo. It enforces the rules the store
/// relies on: documents need an existing holder, secondary holders need a
/// trust document, holders with documents cannot be deleted, quotas and
/// document limits apply, and documents come back percent-encoded.
///
/// Every call is counted, and one-shot failures can be queued with
/// [`fail_next`](Self::fail_next).
pub struct InMemoryBacking {
    holders: RwLock<HashMap<HolderKey, HolderState>>,
    limits: BackingLimits,
    calls: Mutex<HashMap<(BackingOp, Option<HolderKind>), usize>>,
    faults: Mutex<Vec<Fault>>,
}

impl InMemoryBacking {
    pub fn new() -> Self {
        Self::with_limits(BackingLimits::default())
    }

    pub fn with_limits(limits: BackingLimits) -> Self {
        Self {
            holders: RwLock::new(HashMap::new()),
            limits,
            calls: Mutex::new(HashMap::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Make the next call of `op` fail with `error`. With `kind` set, only a
    /// call against that holder kind triggers the fault.
    pub fn fail_next(&self, op: BackingOp, kind: Option<HolderKind>, error: BackingError) {
        self.faults
            .lock()
            .expect("lock poisoned")
            .push(Fault { op, kind, error });
    }

    /// Calls of `op` across both holder kinds.
    pub fn calls(&self, op: BackingOp) -> usize {
        self.calls
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|((o, _), _)| *o == op)
            .map(|(_, n)| n)
            .sum()
    }

    /// Calls of `op` against holders of `kind`.
    pub fn calls_for(&self, op: BackingOp, kind: HolderKind) -> usize {
        self.calls
            .lock()
            .expect("lock poisoned")
            .get(&(op, Some(kind)))
            .copied()
            .unwrap_or(0)
    }

    /// Calls that modify state.
    pub fn write_calls(&self) -> usize {
        [
            BackingOp::PutDocument,
            BackingOp::CreateHolder,
            BackingOp::DeleteDocument,
            BackingOp::DeleteHolder,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("lock poisoned").values().sum()
    }

    pub fn holder_exists(&self, kind: HolderKind, name: &str) -> bool {
        self.holders
            .read()
            .expect("lock poisoned")
            .contains_key(&(kind, name.to_string()))
    }

    pub fn holder_count(&self, kind: HolderKind) -> usize {
        self.holders
            .read()
            .expect("lock poisoned")
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    /// Trust document the holder was created with.
    pub fn trust_document(&self, kind: HolderKind, name: &str) -> Option<String> {
        self.holders
            .read()
            .expect("lock poisoned")
            .get(&(kind, name.to_string()))
            .and_then(|h| h.trust_document.clone())
    }

    /// The document as it was written, without the service's encoding.
    pub fn raw_document(&self, holder: &HolderRef) -> Option<String> {
        self.holders
            .read()
            .expect("lock poisoned")
            .get(&(holder.kind, holder.name.clone()))
            .and_then(|h| h.documents.get(&holder.document).cloned())
    }

    /// Place a document directly, creating the holder if needed and
    /// bypassing quotas and validation.
    pub fn insert_raw_document(&self, holder: &HolderRef, document: &str) {
        self.holders
            .write()
            .expect("lock poisoned")
            .entry((holder.kind, holder.name.clone()))
            .or_default()
            .documents
            .insert(holder.document.clone(), document.to_string());
    }

    fn record(&self, op: BackingOp, kind: Option<HolderKind>) -> BackingResult<()> {
        *self
            .calls
            .lock()
            .expect("lock poisoned")
            .entry((op, kind))
            .or_insert(0) += 1;

        let mut faults = self.faults.lock().expect("lock poisoned");
        let hit = faults
            .iter()
            .position(|f| f.op == op && (f.kind.is_none() || f.kind == kind));
        match hit {
            Some(idx) => Err(faults.remove(idx).error),
            None => Ok(()),
        }
    }

    fn quota(&self, kind: HolderKind) -> u64 {
        match kind {
            HolderKind::Primary => self.limits.primary_holder_quota,
            HolderKind::Secondary => self.limits.secondary_holder_quota,
        }
    }

    fn document_limit(&self, kind: HolderKind) -> usize {
        match kind {
            HolderKind::Primary => self.limits.primary_document_limit,
            HolderKind::Secondary => self.limits.secondary_document_limit,
        }
    }
}

impl Default for InMemoryBacking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttributeBackend for InMemoryBacking {
    async fn get_document(&self, holder: &HolderRef) -> BackingResult<String> {
        self.record(BackingOp::GetDocument, Some(holder.kind))?;
        self.raw_document(holder)
            .map(|doc| percent::encode(&doc))
            .ok_or_else(|| BackingError::NoSuchEntity(holder.to_string()))
    }

    async fn put_document(&self, holder: &HolderRef, document: &str) -> BackingResult<()> {
        self.record(BackingOp::PutDocument, Some(holder.kind))?;
        if serde_json::from_str::<serde_json::Value>(document).is_err() {
            return Err(BackingError::InvalidInput(format!(
                "malformed document for {holder}"
            )));
        }
        let limit = self.document_limit(holder.kind);
        if document.len() > limit {
            return Err(BackingError::LimitExceeded(format!(
                "document of {} bytes exceeds {limit} for {holder}",
                document.len()
            )));
        }
        let mut holders = self.holders.write().expect("lock poisoned");
        let state = holders
            .get_mut(&(holder.kind, holder.name.clone()))
            .ok_or_else(|| BackingError::NoSuchEntity(holder.name.clone()))?;
        state
            .documents
            .insert(holder.document.clone(), document.to_string());
        Ok(())
    }

    async fn create_holder(
        &self,
        holder: &HolderRef,
        trust_document: Option<&str>,
    ) -> BackingResult<()> {
        self.record(BackingOp::CreateHolder, Some(holder.kind))?;
        if holder.kind.requires_trust_document() {
            let trust = trust_document.ok_or_else(|| {
                BackingError::InvalidInput(format!("{holder} requires a trust document"))
            })?;
            if serde_json::from_str::<serde_json::Value>(trust).is_err() {
                return Err(BackingError::InvalidInput("malformed trust document".into()));
            }
        }

        let mut holders = self.holders.write().expect("lock poisoned");
        let key = (holder.kind, holder.name.clone());
        if holders.contains_key(&key) {
            return Err(BackingError::EntityAlreadyExists(holder.name.clone()));
        }
        let in_use = holders.keys().filter(|(k, _)| *k == holder.kind).count() as u64;
        if in_use >= self.quota(holder.kind) {
            return Err(BackingError::LimitExceeded(format!(
                "{} holder quota of {} reached",
                holder.kind,
                self.quota(holder.kind)
            )));
        }
        holders.insert(
            key,
            HolderState {
                trust_document: trust_document.map(str::to_string),
                documents: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_document(&self, holder: &HolderRef) -> BackingResult<()> {
        self.record(BackingOp::DeleteDocument, Some(holder.kind))?;
        let mut holders = self.holders.write().expect("lock poisoned");
        holders
            .get_mut(&(holder.kind, holder.name.clone()))
            .and_then(|h| h.documents.remove(&holder.document))
            .map(|_| ())
            .ok_or_else(|| BackingError::NoSuchEntity(holder.to_string()))
    }

    async fn delete_holder(&self, holder: &HolderRef) -> BackingResult<()> {
        self.record(BackingOp::DeleteHolder, Some(holder.kind))?;
        let mut holders = self.holders.write().expect("lock poisoned");
        let key = (holder.kind, holder.name.clone());
        match holders.get(&key) {
            None => Err(BackingError::NoSuchEntity(holder.name.clone())),
            Some(state) if !state.documents.is_empty() => {
                Err(BackingError::DeleteConflict(holder.name.clone()))
            }
            Some(_) => {
                holders.remove(&key);
                Ok(())
            }
        }
    }

    async fn account_summary(&self) -> BackingResult<AccountSummary> {
        self.record(BackingOp::AccountSummary, None)?;
        Ok(AccountSummary {
            primary_holders: self.holder_count(HolderKind::Primary) as u64,
            primary_holder_quota: self.limits.primary_holder_quota,
            secondary_holders: self.holder_count(HolderKind::Secondary) as u64,
            secondary_holder_quota: self.limits.secondary_holder_quota,
        })
    }
}

impl std::fmt::Debug for InMemoryBacking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBacking")
            .field("primary_holders", &self.holder_count(HolderKind::Primary))
            .field("secondary_holders", &self.holder_count(HolderKind::Secondary))
            .field("limits", &self.limits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(name: &str) -> HolderRef {
        HolderRef::new(HolderKind::Primary, name, "data")
    }

    fn secondary(name: &str) -> HolderRef {
        HolderRef::new(HolderKind::Secondary, name, "data")
    }

    const DOC: &str = r#"{"k":"v"}"#;

    #[tokio::test]
    async fn put_requires_holder() {
        let backing = InMemoryBacking::new();
        let err = backing.put_document(&primary("u-a"), DOC).await.unwrap_err();
        assert!(err.is_not_found());

        backing.create_holder(&primary("u-a"), None).await.unwrap();
        backing.put_document(&primary("u-a"), DOC).await.unwrap();
        assert_eq!(backing.raw_document(&primary("u-a")).unwrap(), DOC);
    }

    #[tokio::test]
    async fn get_returns_encoded_document() {
        let backing = InMemoryBacking::new();
        backing.insert_raw_document(&primary("u-a"), DOC);
        let got = backing.get_document(&primary("u-a")).await.unwrap();
        assert_eq!(got, "%7B%22k%22%3A%22v%22%7D");
        assert_eq!(percent::decode(&got).unwrap(), DOC);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let backing = InMemoryBacking::new();
        assert!(backing.get_document(&primary("u-x")).await.unwrap_err().is_not_found());
        backing.create_holder(&primary("u-x"), None).await.unwrap();
        assert!(backing.get_document(&primary("u-x")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn secondary_holder_needs_trust_document() {
        let backing = InMemoryBacking::new();
        let err = backing.create_holder(&secondary("r-a"), None).await.unwrap_err();
        assert!(matches!(err, BackingError::InvalidInput(_)));
        backing
            .create_holder(&secondary("r-a"), Some(r#"{"Version":"2012-10-17"}"#))
            .await
            .unwrap();
        assert!(backing.holder_exists(HolderKind::Secondary, "r-a"));
    }

    #[tokio::test]
    async fn duplicate_holder_already_exists() {
        let backing = InMemoryBacking::new();
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        let err = backing.create_holder(&primary("u-a"), None).await.unwrap_err();
        assert!(matches!(err, BackingError::EntityAlreadyExists(_)));
    }

    #[tokio::test]
    async fn kinds_have_separate_namespaces() {
        let backing = InMemoryBacking::new();
        backing.create_holder(&primary("same"), None).await.unwrap();
        backing.create_holder(&secondary("same"), Some("{}")).await.unwrap();
        assert_eq!(backing.holder_count(HolderKind::Primary), 1);
        assert_eq!(backing.holder_count(HolderKind::Secondary), 1);
    }

    #[tokio::test]
    async fn quota_is_enforced() {
        let backing = InMemoryBacking::with_limits(BackingLimits {
            primary_holder_quota: 1,
            ..Default::default()
        });
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        let err = backing.create_holder(&primary("u-b"), None).await.unwrap_err();
        assert!(matches!(err, BackingError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn document_limit_is_enforced() {
        let backing = InMemoryBacking::with_limits(BackingLimits {
            primary_document_limit: 8,
            ..Default::default()
        });
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        let err = backing
            .put_document(&primary("u-a"), r#"{"long":"value"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, BackingError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn malformed_document_is_rejected() {
        let backing = InMemoryBacking::new();
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        let err = backing.put_document(&primary("u-a"), "{oops").await.unwrap_err();
        assert!(matches!(err, BackingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn holder_with_document_cannot_be_deleted() {
        let backing = InMemoryBacking::new();
        backing.insert_raw_document(&primary("u-a"), DOC);
        let err = backing.delete_holder(&primary("u-a")).await.unwrap_err();
        assert!(matches!(err, BackingError::DeleteConflict(_)));

        backing.delete_document(&primary("u-a")).await.unwrap();
        backing.delete_holder(&primary("u-a")).await.unwrap();
        assert!(!backing.holder_exists(HolderKind::Primary, "u-a"));
        assert!(backing.delete_holder(&primary("u-a")).await.unwrap_err().is_not_found());
        assert!(backing.delete_document(&primary("u-a")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let backing = InMemoryBacking::new();
        backing.fail_next(
            BackingOp::CreateHolder,
            Some(HolderKind::Secondary),
            BackingError::Service("throttled".into()),
        );
        // A primary call does not consume a secondary fault.
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        let err = backing.create_holder(&secondary("r-a"), Some("{}")).await.unwrap_err();
        assert_eq!(err, BackingError::Service("throttled".into()));
        backing.create_holder(&secondary("r-a"), Some("{}")).await.unwrap();
    }

    #[tokio::test]
    async fn calls_are_counted_per_kind() {
        let backing = InMemoryBacking::new();
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        let _ = backing.get_document(&primary("u-a")).await;
        let _ = backing.get_document(&secondary("r-a")).await;
        backing.account_summary().await.unwrap();

        assert_eq!(backing.calls(BackingOp::GetDocument), 2);
        assert_eq!(backing.calls_for(BackingOp::GetDocument, HolderKind::Secondary), 1);
        assert_eq!(backing.calls(BackingOp::AccountSummary), 1);
        assert_eq!(backing.write_calls(), 1);
        assert_eq!(backing.total_calls(), 4);
    }

    #[tokio::test]
    async fn summary_reports_counts_and_quotas() {
        let backing = InMemoryBacking::new();
        backing.create_holder(&primary("u-a"), None).await.unwrap();
        backing.create_holder(&primary("u-b"), None).await.unwrap();
        backing.create_holder(&secondary("r-a"), Some("{}")).await.unwrap();
        let summary = backing.account_summary().await.unwrap();
        assert_eq!(summary.primary_holders, 2);
        assert_eq!(summary.secondary_holders, 1);
        assert_eq!(summary.primary_holder_quota, 5000);
        assert_eq!(summary.secondary_holder_quota, 1000);
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", InMemoryBacking::new());
        assert!(debug.contains("InMemoryBacking"));
        assert!(debug.contains("primary_holders"));
    }
}
