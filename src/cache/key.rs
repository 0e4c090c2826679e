//! Cache key derivation from fingerprints and operation parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::fingerprint::Fingerprint;

/// Hex characters of the parameter digest kept in the key.
const KEY_DIGEST_LEN: usize = 32;

/// Cache-eligible analysis operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Describe,
    Analyze,
    Compare,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Analyze => "analyze",
            Self::Compare => "compare",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, filesystem-safe cache key: `<operation>_<32 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept an externally supplied key only if it is safe to use as a file stem.
    pub fn parse(raw: &str) -> Option<Self> {
        let safe = !raw.is_empty()
            && raw.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        safe.then(|| Self(raw.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds a [`CacheKey`] from an operation, its source fingerprints and the
/// parameters that influence the model output.
///
/// Fingerprints keep insertion order, so comparisons are order-sensitive:
/// `compare(a, b)` and `compare(b, a)` produce different keys. Parameters
/// are sorted by name before hashing.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: OperationKind,
    fingerprints: Vec<Fingerprint>,
    params: BTreeMap<String, String>,
}

impl CacheKeyBuilder {
    pub fn new(operation: OperationKind) -> Self {
        Self { operation, fingerprints: Vec::new(), params: BTreeMap::new() }
    }

    pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprints.push(fingerprint);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn build(&self) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(self.operation.as_str().as_bytes());
        hasher.update(b"\n");
        for fingerprint in &self.fingerprints {
            hasher.update(fingerprint.as_str().as_bytes());
            hasher.update(b"\n");
        }
        // JSON of a BTreeMap<String, String> is unambiguous about separators
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        hasher.update(params.as_bytes());

        let digest = hex::encode(hasher.finalize());
        CacheKey(format!("{}_{}", self.operation.as_str(), &digest[..KEY_DIGEST_LEN]))
    }
}
