//! Content hashing for cvc objects.
//!
//! Every stored object is addressed by a domain-separated BLAKE3 hash of its
//! canonical bytes. The domain tag keeps a source and a version with identical
//! bytes from colliding.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError};
