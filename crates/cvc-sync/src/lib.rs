//! Moving components and lanes between scopes.
//!
//! Export qualifies local components with the remote scope's name. Since the
//! scope is part of every version's content, each version in their history
//! is rewritten and re-hashed, then pushed together with the sources it
//! needs. Import walks a remote closure by hash, verifies every object it
//! receives, and fast-forwards local refs.
//!
//! Remotes are reached through the [`RemoteScope`] trait; [`InMemoryRemote`]
//! serves one straight from memory.

pub mod error;
pub mod export;
pub mod import;
pub mod memory;
pub mod negotiation;
pub mod transport;
pub mod types;
pub mod verifier;

pub use error::{SyncError, SyncResult};
pub use export::Exporter;
pub use import::Importer;
pub use memory::InMemoryRemote;
pub use negotiation::{Negotiation, NegotiationEngine};
pub use transport::RemoteScope;
pub use types::{
    ExportRequest, ExportResult, ExportedComponent, ImportRequest, ImportResult,
    ImportStatus, ImportedComponent, ImportedLane, RefRejection,
};
pub use verifier::{SyncVerifier, VerificationReport};
