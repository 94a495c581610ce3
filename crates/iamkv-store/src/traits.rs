use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BackingResult;
use crate::holder::HolderRef;
use crate::usage::AccountSummary;

/// Client for the access-control service the store smuggles records into.
///
/// Implementations must report the failure classes the store branches on
/// through the matching [`BackingError`](crate::BackingError) variant:
/// - `put_document` on a missing holder returns `NoSuchEntity`.
/// - `create_holder` on an existing holder returns `EntityAlreadyExists`.
/// - `get_document`, `delete_document` and `delete_holder` on a missing
///   target return `NoSuchEntity`.
///
/// Timeouts and retries of individual calls are the implementation's concern.
#[async_trait]
pub trait AttributeBackend: Send + Sync {
    /// Fetch the document on a holder, percent-encoded as the service
    /// returns it.
    async fn get_document(&self, holder: &HolderRef) -> BackingResult<String>;

    /// Create or overwrite the document on an existing holder.
    async fn put_document(&self, holder: &HolderRef, document: &str) -> BackingResult<()>;

    /// Create a holder. Secondary holders must be given a trust document.
    async fn create_holder(
        &self,
        holder: &HolderRef,
        trust_document: Option<&str>,
    ) -> BackingResult<()>;

    /// Remove the document from a holder, leaving the holder itself.
    async fn delete_document(&self, holder: &HolderRef) -> BackingResult<()>;

    /// Remove a holder. Fails with `DeleteConflict` while a document is
    /// still attached.
    async fn delete_holder(&self, holder: &HolderRef) -> BackingResult<()>;

    /// Account-wide holder counts and quotas.
    async fn account_summary(&self) -> BackingResult<AccountSummary>;
}

#[async_trait]
impl<B: AttributeBackend + ?Sized> AttributeBackend for Arc<B> {
    async fn get_document(&self, holder: &HolderRef) -> BackingResult<String> {
        (**self).get_document(holder).await
    }

    async fn put_document(&self, holder: &HolderRef, document: &str) -> BackingResult<()> {
        (**self).put_document(holder, document).await
    }

    async fn create_holder(
        &self,
        holder: &HolderRef,
        trust_document: Option<&str>,
    ) -> BackingResult<()> {
        (**self).create_holder(holder, trust_document).await
    }

    async fn delete_document(&self, holder: &HolderRef) -> BackingResult<()> {
        (**self).delete_document(holder).await
    }

    async fn delete_holder(&self, holder: &HolderRef) -> BackingResult<()> {
        (**self).delete_holder(holder).await
    }

    async fn account_summary(&self) -> BackingResult<AccountSummary> {
        (**self).account_summary().await
    }
}

#[async_trait]
impl<B: AttributeBackend + ?Sized> AttributeBackend for Box<B> {
    async fn get_document(&self, holder: &HolderRef) -> BackingResult<String> {
        (**self).get_document(holder).await
    }

    async fn put_document(&self, holder: &HolderRef, document: &str) -> BackingResult<()> {
        (**self).put_document(holder, document).await
    }

    async fn create_holder(
        &self,
        holder: &HolderRef,
        trust_document: Option<&str>,
    ) -> BackingResult<()> {
        (**self).create_holder(holder, trust_document).await
    }

    async fn delete_document(&self, holder: &HolderRef) -> BackingResult<()> {
        (**self).delete_document(holder).await
    }

    async fn delete_holder(&self, holder: &HolderRef) -> BackingResult<()> {
        (**self).delete_holder(holder).await
    }

    async fn account_summary(&self) -> BackingResult<AccountSummary> {
        (**self).account_summary().await
    }
}
