//! Content-addressed, file-backed cache for image analysis results.
//!
//! A result is keyed by the SHA-256 fingerprint of the source image(s) plus
//! the parameters that shape the model output. Entries expire after a fixed
//! TTL and are evicted lazily when read. Store failures are reported as
//! `Result`s so the caller can fall back to a live call.

pub mod fingerprint;
pub mod key;
pub mod store;

pub use fingerprint::{fingerprint_bytes, fingerprint_file, Fingerprint, FingerprintError};
pub use key::{CacheKey, CacheKeyBuilder, OperationKind};
pub use store::{
    CacheEntry, CacheError, CacheStats, CacheStore, DEFAULT_CACHE_SUBDIR, DEFAULT_TTL,
};
