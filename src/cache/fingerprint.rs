//! Content fingerprints for cache staleness detection.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const READ_CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a file's full byte content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FingerprintError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Unreadable { path: path.to_path_buf(), source }
        }
    }
}

/// Fingerprint a file by streaming it through SHA-256.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, FingerprintError> {
    let file = File::open(path).map_err(|e| FingerprintError::from_io(path, e))?;
    let mut reader = BufReader::with_capacity(READ_CHUNK, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FingerprintError::from_io(path, e)),
        };
        hasher.update(&buf[..read]);
    }

    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Fingerprint an in-memory buffer. Produces the same digest as
/// [`fingerprint_file`] for a file with identical bytes.
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint(hex::encode(Sha256::digest(bytes)))
}
