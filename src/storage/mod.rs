//! Storage backend abstraction
//!
//! Each concrete service is wrapped behind the same narrow capability
//! interface: list a container, open a read stream, stage to a local file,
//! and the two upload shapes. Whether a backend streams or stages is a fixed
//! capability flag, not a runtime string check in the engine.

mod cloudfiles;
mod s3;

#[cfg(test)]
pub(crate) mod memory;

pub use cloudfiles::CloudFilesBackend;
pub use s3::S3Backend;

use crate::error::{MirrorError, Result};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// The two supported storage services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Amazon S3
    S3,
    /// Rackspace-style Cloud Files (OpenStack Swift)
    CloudFiles,
}

impl BackendKind {
    /// Short identifier as used in scenario strings
    pub fn ident(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::CloudFiles => "cf",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ident())
    }
}

impl FromStr for BackendKind {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s3" => Ok(Self::S3),
            "cf" => Ok(Self::CloudFiles),
            other => Err(MirrorError::UnknownBackend(other.to_string())),
        }
    }
}

/// How object bytes move out of a backend when it is the copy source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Bytes can be piped straight into the destination's upload call
    Streaming,
    /// Bytes must be fully written to a local file first
    Staging,
}

/// One object as reported by a container listing.
///
/// Read-only snapshot; the fingerprint is the backend's ETag/hash with any
/// surrounding quotes already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Key within the container, exactly as the backend returned it
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Backend-supplied content digest
    pub fingerprint: String,
    /// MIME type, when the listing carries one
    pub content_type: Option<String>,
}

impl ObjectRecord {
    /// Strip the quoting some services wrap around ETag values
    pub fn normalize_fingerprint(raw: &str) -> String {
        raw.trim_matches('"').to_string()
    }
}

/// An opened read stream plus the metadata the destination upload needs
pub struct FetchedObject {
    /// Object bytes
    pub reader: Box<dyn Read + Send>,
    /// Declared size in bytes
    pub size: u64,
    /// MIME type reported by the source, if any
    pub content_type: Option<String>,
}

/// Uniform capability interface over one concrete storage service.
///
/// `fetch_stream` is only guaranteed for backends whose `transfer_mode` is
/// [`TransferMode::Streaming`]; `stage_to_local` is the counterpart for
/// staging backends. Both upload shapes must be supported by every
/// destination, but which one the engine uses for a given direction is fixed
/// by the source's mode.
pub trait StorageBackend: Send + Sync {
    /// Which service this adapter wraps
    fn kind(&self) -> BackendKind;

    /// Fixed capability flag for this backend as a copy source
    fn transfer_mode(&self) -> TransferMode;

    /// Cheap account-level probe, run once at startup before any listing
    fn verify_connection(&self) -> Result<()>;

    /// List every object in a container
    fn list_objects(&self, container: &str) -> Result<Vec<ObjectRecord>>;

    /// Open a read stream for one object, with upload metadata
    fn fetch_stream(&self, container: &str, key: &str) -> Result<FetchedObject>;

    /// Write the full object to a local path, returning the byte count
    fn stage_to_local(&self, container: &str, key: &str, path: &Path) -> Result<u64>;

    /// Upload from a reader, returning bytes written
    fn put_from_stream(&self, container: &str, key: &str, object: FetchedObject) -> Result<u64>;

    /// Upload from a staged local file, overwriting any existing object
    fn put_from_local(&self, container: &str, key: &str, path: &Path) -> Result<u64>;
}

/// Resolves backend kinds to the adapters opened for this run.
///
/// Both connections are opened once and shared read-only across all workers;
/// per-object state never touches the set itself.
#[derive(Clone)]
pub struct BackendSet {
    backends: HashMap<BackendKind, Arc<dyn StorageBackend>>,
}

impl BackendSet {
    /// Build a set from the adapters opened at startup
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        Self {
            backends: backends.into_iter().map(|b| (b.kind(), b)).collect(),
        }
    }

    /// Look up the adapter for a kind
    pub fn get(&self, kind: BackendKind) -> Result<Arc<dyn StorageBackend>> {
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| MirrorError::UnknownBackend(kind.ident().to_string()))
    }
}
