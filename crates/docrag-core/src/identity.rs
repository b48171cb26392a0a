//! Deterministic chunk identity: normalization, hashing, UUIDv5 ids.
//!
//! Identity is a pure function of normalized text: the same content
//! anywhere in the corpus maps to the same id and content hash, which is
//! the dedup key used by fusion and the upsert key for both indexes.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;

/// Soft hyphen, stripped during normalization.
const SOFT_HYPHEN: char = '\u{00AD}';

/// Block size for streaming file hashing.
const HASH_BLOCK_SIZE: usize = 8192;

/// Normalize chunk text: strip soft hyphens, collapse all whitespace
/// runs to single spaces, trim the ends.
pub fn normalize_text(text: &str) -> String {
    text.replace(SOFT_HYPHEN, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 hex digest of the normalized chunk text.
pub fn content_hash(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// UUIDv5 over the DNS namespace and the normalized chunk text.
pub fn chunk_id(normalized: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, normalized.as_bytes())
}

/// SHA-256 hex digest of the raw file bytes, streamed in fixed-size blocks.
pub fn file_hash(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path.as_ref())?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BLOCK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
