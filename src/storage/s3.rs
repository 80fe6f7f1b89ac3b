//! Amazon S3 adapter
//!
//! Drives the `aws` CLI rather than linking an SDK; the CLI handles
//! authentication, retries, and listing pagination on its own. Credentials
//! from the run's config file are injected as environment variables, falling
//! back to the CLI's normal config chain when unset.

use crate::config::S3Credentials;
use crate::error::{MirrorError, Result};
use crate::storage::{
    BackendKind, FetchedObject, ObjectRecord, StorageBackend, TransferMode,
};
use serde::Deserialize;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// S3 adapter over the `aws` CLI
pub struct S3Backend {
    credentials: S3Credentials,
}

#[derive(Deserialize)]
struct ListObjectsOutput {
    #[serde(rename = "Contents", default)]
    contents: Vec<ListEntry>,
}

#[derive(Deserialize)]
struct ListEntry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Size")]
    size: u64,
    #[serde(rename = "ETag", default)]
    etag: String,
}

#[derive(Deserialize)]
struct HeadObjectOutput {
    #[serde(rename = "ContentLength")]
    content_length: u64,
    #[serde(rename = "ContentType")]
    content_type: Option<String>,
}

impl S3Backend {
    /// Create an adapter using the given credential overrides
    pub fn new(credentials: S3Credentials) -> Self {
        Self { credentials }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("aws");
        cmd.env_credentials(&self.credentials);
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        debug!(target: "cloudmirror::s3", ?args, "aws");
        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|e| MirrorError::connection("s3", format!("cannot run aws CLI: {e}")))?;

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

/// Map aws CLI stderr onto the error taxonomy
fn classify_failure(stderr: &str, args: &[&str]) -> MirrorError {
    let detail = stderr.trim().to_string();
    if stderr.contains("NoSuchBucket") {
        MirrorError::ContainerNotFound {
            backend: "s3".into(),
            container: args.last().unwrap_or(&"").to_string(),
        }
    } else if stderr.contains("AccessDenied")
        || stderr.contains("InvalidAccessKeyId")
        || stderr.contains("SignatureDoesNotMatch")
        || stderr.contains("Could not connect")
    {
        MirrorError::connection("s3", detail)
    } else {
        MirrorError::transfer(args.last().unwrap_or(&"").to_string(), detail)
    }
}

impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    // S3 reads can be piped straight into the counterpart's upload call.
    fn transfer_mode(&self) -> TransferMode {
        TransferMode::Streaming
    }

    fn verify_connection(&self) -> Result<()> {
        self.run(&["s3api", "list-buckets", "--query", "Owner.ID", "--output", "text"])
            .map(|_| ())
            .map_err(|e| MirrorError::connection("s3", e.to_string()))
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectRecord>> {
        let stdout = self.run(&[
            "s3api",
            "list-objects-v2",
            "--output",
            "json",
            "--bucket",
            container,
        ])?;

        // Empty buckets produce no output at all from the CLI.
        if stdout.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        let listing: ListObjectsOutput =
            serde_json::from_slice(&stdout).map_err(|e| MirrorError::ListingParse {
                backend: "s3".into(),
                message: e.to_string(),
            })?;

        Ok(listing
            .contents
            .into_iter()
            .map(|entry| ObjectRecord {
                fingerprint: ObjectRecord::normalize_fingerprint(&entry.etag),
                key: entry.key,
                size: entry.size,
                content_type: None,
            })
            .collect())
    }

    fn fetch_stream(&self, container: &str, key: &str) -> Result<FetchedObject> {
        // Listing output has no content type, so ask for the full metadata
        // before opening the byte stream.
        let head = self.run(&[
            "s3api",
            "head-object",
            "--output",
            "json",
            "--bucket",
            container,
            "--key",
            key,
        ])?;
        let meta: HeadObjectOutput =
            serde_json::from_slice(&head).map_err(|e| MirrorError::ListingParse {
                backend: "s3".into(),
                message: e.to_string(),
            })?;

        let url = format!("s3://{container}/{key}");
        let child = self
            .command()
            .args(["s3", "cp", url.as_str(), "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MirrorError::transfer(key, format!("cannot spawn aws CLI: {e}")))?;

        Ok(FetchedObject {
            reader: Box::new(ChildStreamReader::new(child, key)),
            size: meta.content_length,
            content_type: meta.content_type,
        })
    }

    fn stage_to_local(&self, container: &str, key: &str, path: &Path) -> Result<u64> {
        let url = format!("s3://{container}/{key}");
        self.run(&["s3", "cp", &url, &path.display().to_string()])?;
        let meta = std::fs::metadata(path)
            .map_err(|e| MirrorError::staging(path.to_path_buf(), e))?;
        Ok(meta.len())
    }

    fn put_from_stream(&self, container: &str, key: &str, mut object: FetchedObject) -> Result<u64> {
        let url = format!("s3://{container}/{key}");
        let size = object.size.to_string();
        let content_type = object
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut child = self
            .command()
            .args([
                "s3",
                "cp",
                "-",
                url.as_str(),
                "--expected-size",
                size.as_str(),
                "--content-type",
                content_type.as_str(),
            ])
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| MirrorError::transfer(key, format!("cannot spawn aws CLI: {e}")))?;

        let copied = {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| MirrorError::transfer(key, "no stdin pipe"))?;
            io::copy(&mut object.reader, &mut stdin)
                .map_err(|e| MirrorError::transfer(key, format!("truncated send: {e}")))?
        };

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
        let url = format!("s3://{container}/{key}");
        self.run(&["s3", "cp", &path.display().to_string(), &url])?;
        let meta = std::fs::metadata(path)
            .map_err(|e| MirrorError::staging(path.to_path_buf(), e))?;
        Ok(meta.len())
    }
}

/// Reader over a child process's stdout that surfaces a nonzero exit as an
/// I/O error at end of stream instead of a silent truncation.
struct ChildStreamReader {
    child: Child,
    stdout: std::process::ChildStdout,
    key: String,
    finished: bool,
}

impl ChildStreamReader {
    fn new(mut child: Child, key: &str) -> Self {
        let stdout = child.stdout.take().expect("stdout was piped");
        Self {
            child,
            stdout,
            key: key.to_string(),
            finished: false,
        }
    }
}

impl Read for ChildStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 && !self.finished {
            self.finished = true;
            let status = self.child.wait()?;
            if !status.success() {
                return Err(io::Error::other(format!(
                    "download of '{}' exited with {status}",
                    self.key
                )));
            }
        }
        Ok(n)
    }
}

impl Drop for ChildStreamReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Extension trait for injecting S3 credentials into a Command
trait CommandS3Ext {
    fn env_credentials(&mut self, credentials: &S3Credentials) -> &mut Self;
}

impl CommandS3Ext for Command {
    fn env_credentials(&mut self, credentials: &S3Credentials) -> &mut Self {
        if let Some(ref key) = credentials.access_key_id {
            self.env("AWS_ACCESS_KEY_ID", key);
        }
        if let Some(ref secret) = credentials.secret_access_key {
            self.env("AWS_SECRET_ACCESS_KEY", secret);
        }
        if let Some(ref region) = credentials.region {
            self.env("AWS_REGION", region);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_parse() {
        let json = r#"{
            "Contents": [
                {"Key": "a/b.txt", "Size": 12, "ETag": "\"abc123\""},
                {"Key": "c.bin", "Size": 0, "ETag": "\"def456\""}
            ]
        }"#;
        let listing: ListObjectsOutput = serde_json::from_str(json).unwrap();
        assert_eq!(listing.contents.len(), 2);
        assert_eq!(listing.contents[0].key, "a/b.txt");
        assert_eq!(
            ObjectRecord::normalize_fingerprint(&listing.contents[0].etag),
            "abc123"
        );
    }

    #[test]
    fn test_empty_listing_has_no_contents() {
        let listing: ListObjectsOutput = serde_json::from_str("{}").unwrap();
        assert!(listing.contents.is_empty());
    }

    #[test]
    fn test_failure_classification() {
        let err = classify_failure("An error occurred (NoSuchBucket) ...", &["--bucket", "b"]);
        assert!(matches!(err, MirrorError::ContainerNotFound { .. }));

        let err = classify_failure("An error occurred (AccessDenied) ...", &["--bucket", "b"]);
        assert!(matches!(err, MirrorError::Connection { .. }));

        let err = classify_failure("upload failed: broken pipe", &["k"]);
        assert!(matches!(err, MirrorError::Transfer { .. }));
    }
}
