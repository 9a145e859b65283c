//! Object storage for audio blobs and trace exports.
//!
//! [`ObjectStore`] is the seam a bucket service implements in production.
//! Keys are write-once: `put_once` generates a fresh addressable key
//! embedding the content's SHA-256, so the durable-tier call record can
//! reference the blob and readers can verify integrity.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{Result, StoreError};

/// Put-once blob storage returning addressable keys.
pub trait ObjectStore: Send + Sync {
    /// Store `content` under a freshly generated key beginning with
    /// `prefix`. Never overwrites.
    fn put_once(&self, prefix: &str, content: &[u8]) -> Result<String>;

    /// Fetch a blob by key.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Generate a unique key: `{prefix}/{sha256[..16]}-{uuidv7}`.
fn object_key(prefix: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let hash = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in &hash[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{prefix}/{hex}-{}", Uuid::now_v7())
}

/// In-memory object store for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_once(&self, prefix: &str, content: &[u8]) -> Result<String> {
        let key = object_key(prefix, content);
        if self.blobs.contains_key(&key) {
            // UUIDv7 keys should never collide; treat it as corruption.
            return Err(StoreError::KeyCollision(key));
        }
        let _ = self.blobs.insert(key.clone(), content.to_vec());
        Ok(key)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|b| b.clone()))
    }
}
