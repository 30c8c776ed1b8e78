//! Content-addressable blob storage.
//!
//! Blobs live at `root/hash[0:2]/hash[2:4]/hash.ext`; in-flight writes live in
//! `root/.tmp/` until they are renamed into place.

pub mod atomic;
mod manager;

pub use manager::{StorageManager, StorageStats};
