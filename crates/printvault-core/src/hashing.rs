//! Content hashing for dedup and blob addressing.
//!
//! FNV-1a 64-bit over raw bytes, rendered as 16 lowercase hex characters.
//! This is an identity key, not an integrity check: two different contents
//! that collide are indistinguishable to the catalog.

use crate::config::StorageConfig;
use crate::error::{CatalogError, Result};
use std::io::Read;
use std::path::Path;

/// FNV-1a 64-bit offset basis.
pub const FNV_OFFSET_BASIS: u64 = 14_695_981_039_346_656_037;

/// FNV-1a 64-bit prime.
pub const FNV_PRIME: u64 = 1_099_511_628_211;

/// Length of a rendered hash.
pub const HEX_LEN: usize = 16;

/// Incremental FNV-1a hasher.
///
/// Feeding the same bytes in any chunking yields the same result as
/// [`fnv1a_64`] over the concatenation.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    pub fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    pub fn finish(&self) -> u64 {
        self.state
    }
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a fold over a byte slice.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hasher = Fnv1a64::new();
    hasher.update(bytes);
    hasher.finish()
}

/// Hash raw bytes. Deterministic and side-effect free.
pub fn compute_bytes(bytes: &[u8]) -> u64 {
    fnv1a_64(bytes)
}

/// Hash a buffer and render it as hex.
///
/// Empty input has no identity and yields an empty string.
pub fn compute_buffer(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    to_hex(fnv1a_64(bytes))
}

/// Read a file fully, hash it and render it as hex.
///
/// Returns an empty string if the file cannot be read.
pub fn compute_file(path: impl AsRef<Path>) -> String {
    match hash_file(path.as_ref()) {
        Ok(value) => to_hex(value),
        Err(e) => {
            tracing::debug!("Could not hash {}: {}", path.as_ref().display(), e);
            String::new()
        }
    }
}

/// Stream a file through the hasher in fixed-size chunks.
///
/// Used to verify blobs without holding them in memory.
pub fn hash_file(path: &Path) -> Result<u64> {
    let mut file = std::fs::File::open(path).map_err(|e| CatalogError::io_with_path(e, path))?;

    let mut hasher = Fnv1a64::new();
    let mut buffer = vec![0u8; StorageConfig::COPY_CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| CatalogError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish())
}

/// Render a hash as 16 lowercase, zero-padded hex characters.
pub fn to_hex(value: u64) -> String {
    hex::encode(value.to_be_bytes())
}

/// Parse a 16-character hex hash. Case-insensitive.
pub fn from_hex(text: &str) -> Option<u64> {
    if text.len() != HEX_LEN {
        return None;
    }
    let mut bytes = [0u8; 8];
    hex::decode_to_slice(text, &mut bytes).ok()?;
    Some(u64::from_be_bytes(bytes))
}
