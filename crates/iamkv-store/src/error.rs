use crate::holder::{HolderKind, HolderRef};

/// Errors reported by an [`AttributeBackend`](crate::AttributeBackend).
///
/// The variants mirror the failure classes of the access-control service the
/// store is layered on. The store branches on the variant, never on the text.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackingError {
    /// The holder (or its document) does not exist.
    #[error("no such entity: {0}")]
    NoSuchEntity(String),

    /// A holder with this name already exists.
    #[error("entity already exists: {0}")]
    EntityAlreadyExists(String),

    /// The holder still has a document attached and cannot be removed.
    #[error("delete conflict: {0}")]
    DeleteConflict(String),

    /// An account quota has been reached.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The request was rejected as malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other service or transport failure.
    #[error("service error: {0}")]
    Service(String),
}

impl BackingError {
    /// Returns `true` if the error means the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchEntity(_))
    }
}

/// Result alias for backing operations.
pub type BackingResult<T> = Result<T, BackingError>;

/// Errors from tiered store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The value exceeds the combined capacity of both tiers.
    #[error("value of {len} bytes exceeds store capacity of {max} bytes")]
    TooLarge { len: usize, max: usize },

    /// An encoded document would exceed the backing service's field limit.
    #[error("encoded {tier} document is {size} bytes, limit is {limit}")]
    DocumentTooLarge {
        tier: HolderKind,
        size: usize,
        limit: usize,
    },

    /// Creating a holder, or the write retried after creating it, failed.
    #[error("failed to provision {holder}: {source}")]
    Provisioning {
        holder: HolderRef,
        #[source]
        source: BackingError,
    },

    /// The tiers of a record disagree with the record marker.
    #[error("record {key} is incomplete: expected {expected} bytes, found {actual}")]
    Incomplete {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// The tiers add up to the right length but not to the value that was
    /// written, e.g. a secondary chunk from a different `set`.
    #[error("record {key} failed its checksum")]
    Corrupt { key: String },

    /// A document could not be encoded or decoded.
    #[error("envelope error: {0}")]
    Envelope(String),

    /// The store configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from the backing service.
    #[error("backing error: {0}")]
    Backing(#[from] BackingError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
