//! In-memory storage backend used by unit tests.
//!
//! Supports both transfer modes so the streaming and staging paths can be
//! exercised without a network, and injects per-key failures for the
//! failure-isolation tests.

use crate::error::{MirrorError, Result};
use crate::storage::{
    BackendKind, FetchedObject, ObjectRecord, StorageBackend, TransferMode,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;

#[derive(Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

/// Configurable in-memory double for [`StorageBackend`]
pub struct MemoryBackend {
    kind: BackendKind,
    mode: TransferMode,
    // BTreeMap keeps listings in a stable order for assertions.
    containers: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryBackend {
    pub fn new(kind: BackendKind, mode: TransferMode) -> Self {
        Self {
            kind,
            mode,
            containers: Mutex::new(HashMap::new()),
            failing_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Create a container so listings succeed even when it is empty
    pub fn create_container(&self, container: &str) {
        self.containers
            .lock()
            .unwrap()
            .entry(container.to_string())
            .or_default();
    }

    /// Store an object, deriving its fingerprint from the content
    pub fn insert(&self, container: &str, key: &str, bytes: &[u8], content_type: Option<&str>) {
        self.create_container(container);
        self.containers
            .lock()
            .unwrap()
            .get_mut(container)
            .unwrap()
            .insert(
                key.to_string(),
                StoredObject {
                    bytes: bytes.to_vec(),
                    content_type: content_type.map(str::to_string),
                },
            );
    }

    /// Make every operation touching `key` fail
    pub fn fail_on(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Fetch stored bytes for assertions
    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .and_then(|c| c.get(key))
            .map(|o| o.bytes.clone())
    }

    /// Stored content type for assertions
    pub fn content_type(&self, container: &str, key: &str) -> Option<String> {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .and_then(|c| c.get(key))
            .and_then(|o| o.content_type.clone())
    }

    fn check_failure(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            Err(MirrorError::transfer(key, "injected failure"))
        } else {
            Ok(())
        }
    }
}

/// Content fingerprint matching what a real listing would report: stable for
/// equal bytes, different for different bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{h:016x}")
}

impl StorageBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    fn verify_connection(&self) -> Result<()> {
        Ok(())
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectRecord>> {
        let containers = self.containers.lock().unwrap();
        let objects = containers
            .get(container)
            .ok_or_else(|| MirrorError::ContainerNotFound {
                backend: self.kind.ident().to_string(),
                container: container.to_string(),
            })?;

        Ok(objects
            .iter()
            .map(|(key, obj)| ObjectRecord {
                key: key.clone(),
                size: obj.bytes.len() as u64,
                fingerprint: fingerprint(&obj.bytes),
                content_type: obj.content_type.clone(),
            })
            .collect())
    }

    fn fetch_stream(&self, container: &str, key: &str) -> Result<FetchedObject> {
        self.check_failure(key)?;
        let containers = self.containers.lock().unwrap();
        let obj = containers
            .get(container)
            .and_then(|c| c.get(key))
            .ok_or_else(|| MirrorError::ObjectNotFound {
                container: container.to_string(),
                key: key.to_string(),
            })?;

        Ok(FetchedObject {
            reader: Box::new(Cursor::new(obj.bytes.clone())),
            size: obj.bytes.len() as u64,
            content_type: obj.content_type.clone(),
        })
    }

    fn stage_to_local(&self, container: &str, key: &str, path: &Path) -> Result<u64> {
        self.check_failure(key)?;
        let containers = self.containers.lock().unwrap();
        let obj = containers
            .get(container)
            .and_then(|c| c.get(key))
            .ok_or_else(|| MirrorError::ObjectNotFound {
                container: container.to_string(),
                key: key.to_string(),
            })?;

        std::fs::write(path, &obj.bytes)
            .map_err(|e| MirrorError::staging(path.to_path_buf(), e))?;
        Ok(obj.bytes.len() as u64)
    }

    fn put_from_stream(&self, container: &str, key: &str, mut object: FetchedObject) -> Result<u64> {
        self.check_failure(key)?;
        let mut bytes = Vec::new();
        object
            .reader
            .read_to_end(&mut bytes)
            .map_err(|e| MirrorError::transfer(key, format!("truncated send: {e}")))?;
        let len = bytes.len() as u64;
        let content_type = object.content_type.as_deref();
        self.insert(container, key, &bytes, content_type);
        Ok(len)
    }

    fn put_from_local(&self, container: &str, key: &str, path: &Path) -> Result<u64> {
        self.check_failure(key)?;
        let bytes =
            std::fs::read(path).map_err(|e| MirrorError::staging(path.to_path_buf(), e))?;
        let len = bytes.len() as u64;
        self.insert(container, key, &bytes, None);
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_content() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
    }

    #[test]
    fn test_listing_reflects_inserts() {
        let backend = MemoryBackend::new(BackendKind::S3, TransferMode::Streaming);
        backend.insert("photos", "a.jpg", b"aaa", Some("image/jpeg"));
        backend.insert("photos", "b.jpg", b"bbb", None);

        let listing = backend.list_objects("photos").unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].key, "a.jpg");
        assert_eq!(listing[0].size, 3);
        assert_eq!(listing[0].content_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_missing_container() {
        let backend = MemoryBackend::new(BackendKind::CloudFiles, TransferMode::Staging);
        assert!(matches!(
            backend.list_objects("nope"),
            Err(MirrorError::ContainerNotFound { .. })
        ));
    }

    #[test]
    fn test_injected_failure() {
        let backend = MemoryBackend::new(BackendKind::S3, TransferMode::Streaming);
        backend.insert("c", "bad.bin", b"data", None);
        backend.fail_on("bad.bin");
        assert!(backend.fetch_stream("c", "bad.bin").is_err());
    }
}
