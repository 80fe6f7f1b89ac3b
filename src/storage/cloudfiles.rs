//! Cloud Files (OpenStack Swift) adapter
//!
//! Drives the `swift` CLI. Unlike S3, Cloud Files objects cannot be piped
//! straight into the counterpart's upload call, so this backend declares the
//! staging transfer mode and the engine materializes objects locally before
//! re-uploading them.

use crate::config::SwiftCredentials;
use crate::error::{MirrorError, Result};
use crate::storage::{
    BackendKind, FetchedObject, ObjectRecord, StorageBackend, TransferMode,
};
use serde::Deserialize;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Cloud Files adapter over the `swift` CLI
pub struct CloudFilesBackend {
    credentials: SwiftCredentials,
}

/// One entry of `swift list <container> --json`, which is the raw container
/// listing the Swift API returns.
#[derive(Deserialize)]
struct ListEntry {
    name: String,
    bytes: u64,
    hash: String,
    content_type: Option<String>,
}

impl CloudFilesBackend {
    /// Create an adapter authenticating with the given credentials
    pub fn new(credentials: SwiftCredentials) -> Self {
        Self { credentials }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("swift");
        cmd.env("ST_AUTH", &self.credentials.auth_url)
            .env("ST_USER", &self.credentials.username)
            .env("ST_KEY", &self.credentials.api_key);
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!(target: "cloudmirror::cf", ?args, "swift");
        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|e| MirrorError::connection("cf", format!("cannot run swift CLI: {e}")))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(classify_failure(
                &String::from_utf8_lossy(&output.stderr),
                args,
            ))
        }
    }
}

/// Map swift CLI stderr onto the error taxonomy
fn classify_failure(stderr: &str, args: &[&str]) -> MirrorError {
    let detail = stderr.trim().to_string();
    if stderr.contains("Container") && stderr.contains("not found") || stderr.contains("404") {
        MirrorError::ContainerNotFound {
            backend: "cf".into(),
            container: args.last().unwrap_or(&"").to_string(),
        }
    } else if stderr.contains("Unauthorized")
        || stderr.contains("401")
        || stderr.contains("Auth")
    {
        MirrorError::connection("cf", detail)
    } else {
        MirrorError::transfer(args.last().unwrap_or(&"").to_string(), detail)
    }
}

impl StorageBackend for CloudFilesBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudFiles
    }

    // The S3 upload call needs a seekable local file, so Cloud Files sources
    // always stage through disk.
    fn transfer_mode(&self) -> TransferMode {
        TransferMode::Staging
    }

    fn verify_connection(&self) -> Result<()> {
        self.run(&["stat"])
            .map(|_| ())
            .map_err(|e| MirrorError::connection("cf", e.to_string()))
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectRecord>> {
        let stdout = self.run(&["list", container, "--json"])?;
        let listing: Vec<ListEntry> =
            serde_json::from_slice(&stdout).map_err(|e| MirrorError::ListingParse {
                backend: "cf".into(),
                message: e.to_string(),
            })?;

        Ok(listing
            .into_iter()
            .map(|entry| ObjectRecord {
                fingerprint: ObjectRecord::normalize_fingerprint(&entry.hash),
                key: entry.name,
                size: entry.bytes,
                content_type: entry.content_type,
            })
            .collect())
    }

    fn fetch_stream(&self, _container: &str, key: &str) -> Result<FetchedObject> {
        Err(MirrorError::transfer(
            key,
            "cloud files objects must be staged locally, not streamed",
        ))
    }

    fn stage_to_local(&self, container: &str, key: &str, path: &Path) -> Result<u64> {
        self.run(&[
            "download",
            container,
            key,
            "--output",
            &path.display().to_string(),
        ])?;
        let meta = std::fs::metadata(path)
            .map_err(|e| MirrorError::staging(path.to_path_buf(), e))?;
        Ok(meta.len())
    }

    fn put_from_stream(&self, container: &str, key: &str, mut object: FetchedObject) -> Result<u64> {
        let content_type = object
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
            .to_string();

        let header = format!("Content-Type: {content_type}");
        let mut child = self
            .command()
            .args([
                "upload",
                container,
                "-",
                "--object-name",
                key,
                "--header",
                header.as_str(),
            ])
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| MirrorError::transfer(key, format!("cannot spawn swift CLI: {e}")))?;

        let copied = {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| MirrorError::transfer(key, "no stdin pipe"))?;
            io::copy(&mut object.reader, &mut stdin)
                .map_err(|e| MirrorError::transfer(key, format!("truncated send: {e}")))?
        };

        if copied != object.size {
            return Err(MirrorError::transfer(
                key,
                format!("incomplete send: {copied} of {} bytes", object.size),
            ));
        }

        let output = child
            .wait_with_output()
            .map_err(|e| MirrorError::transfer(key, e.to_string()))?;
        if !output.status.success() {
            return Err(MirrorError::transfer(
                key,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(copied)
    }

    fn put_from_local(&self, container: &str, key: &str, path: &Path) -> Result<u64> {
        self.run(&[
            "upload",
            container,
            &path.display().to_string(),
            "--object-name",
            key,
        ])?;
        let meta = std::fs::metadata(path)
            .map_err(|e| MirrorError::staging(path.to_path_buf(), e))?;
        Ok(meta.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_parse() {
        let json = r#"[
            {"name": "img/a.png", "bytes": 2048, "hash": "abc123",
             "content_type": "image/png", "last_modified": "2026-01-02T03:04:05"},
            {"name": "empty/", "bytes": 0, "hash": "d41d8", "content_type": null}
        ]"#;
        let listing: Vec<ListEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].name, "img/a.png");
        assert_eq!(listing[0].content_type.as_deref(), Some("image/png"));
        assert_eq!(listing[1].hash, "d41d8");
    }

    #[test]
    fn test_failure_classification() {
        let err = classify_failure("Container 'x' not found", &["list", "x"]);
        assert!(matches!(err, MirrorError::ContainerNotFound { .. }));

        let err = classify_failure("401 Unauthorized", &["stat"]);
        assert!(matches!(err, MirrorError::Connection { .. }));

        let err = classify_failure("Object PUT failed", &["k"]);
        assert!(matches!(err, MirrorError::Transfer { .. }));
    }

    #[test]
    fn test_streaming_fetch_is_rejected() {
        let backend = CloudFilesBackend::new(SwiftCredentials {
            auth_url: "https://auth.example/v1.0".into(),
            username: "user".into(),
            api_key: "key".into(),
        });
        assert_eq!(backend.transfer_mode(), TransferMode::Staging);
        assert!(backend.fetch_stream("c", "k").is_err());
    }
}
