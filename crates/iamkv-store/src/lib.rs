//! Two-tier key-value store over an access-control service.
//!
//! The backing service was never meant to hold data: it offers holder
//! objects (users, roles) that each carry a small policy document. This crate
//! hides records inside those documents. A value that does not fit the
//! primary holder's document spills into a secondary holder with a larger
//! one, and is put back together on read.
//!
//! # Layout
//!
//! - Primary holder `<primary_prefix><key>`: first `primary_capacity` bytes
//!   of the value plus a [`RecordMarker`] (total length and CRC-32).
//! - Secondary holder `<secondary_prefix><key>`: the remainder, if any.
//!   Creating it requires a trust document.
//!
//! # Operations
//!
//! All live on [`TieredStore`], generic over an [`AttributeBackend`]:
//!
//! - [`TieredStore::set`] splits, provisions missing holders, writes.
//! - [`TieredStore::get`] reads and reassembles, checking the marker.
//! - [`TieredStore::delete`] removes documents then holders, best effort.
//! - [`TieredStore::usage`] estimates used and maximum capacity.
//!
//! # Backends
//!
//! - [`InMemoryBacking`] models the service's rules in memory, with call
//!   counting and fault injection for tests.

pub mod config;
pub mod delete;
pub mod envelope;
pub mod error;
pub mod holder;
pub mod layout;
pub mod memory;
pub mod percent;
pub mod store;
pub mod traits;
pub mod usage;

pub use config::{StoreConfig, DEFAULT_TRUST_DOCUMENT};
pub use delete::{DeleteOutcome, DeleteReport, DeleteStep, DeleteTarget};
pub use envelope::{DecodedChunk, Envelope, RecordMarker};
pub use error::{BackingError, BackingResult, StoreError, StoreResult};
pub use holder::{HolderKind, HolderRef};
pub use layout::{Chunk, ChunkLayout};
pub use memory::{BackingLimits, BackingOp, InMemoryBacking};
pub use store::TieredStore;
pub use traits::AttributeBackend;
pub use usage::{AccountSummary, UsageReport};
