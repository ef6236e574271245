//! Content-addressed object storage for cvc.
//!
//! Every record cvc persists (sources, versions, component records, lane
//! states and lane histories) is an immutable object identified by the
//! domain-separated BLAKE3 hash of its bytes. The store is a pure key-value
//! arena: it never interprets object contents, and mutable pointers into it
//! live in `cvc-refs`.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- `objects/<2 hex>/<62 hex>` files, zstd-compressed,
//!   written atomically
//!
//! # Rules
//!
//! 1. Objects are immutable once written; equal bytes share one id.
//! 2. Write objects first, link them from refs last.
//! 3. Every read re-hashes the object and rejects mismatches as corruption.

pub mod error;
pub mod fs;
pub mod fsutil;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{ObjectKind, StoredObject};
pub use traits::ObjectStore;
