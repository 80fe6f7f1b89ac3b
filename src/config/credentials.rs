//! Credentials file loading
//!
//! Credentials live in a single JSON file. Swift credentials are required
//! before a Cloud Files adapter can be built; the S3 section is optional
//! because the `aws` CLI has its own configuration chain. Every failure mode
//! here is a `Credentials` error, which is fatal and distinguishable in logs
//! from a backend connection failure.

use crate::error::{MirrorError, Result};
use serde::Deserialize;
use std::path::Path;

/// Cloud Files authentication material
#[derive(Debug, Clone, Deserialize)]
pub struct SwiftCredentials {
    /// Authentication endpoint
    pub auth_url: String,
    /// Account username
    pub username: String,
    /// API key
    pub api_key: String,
}

/// Optional S3 credential overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Credentials {
    /// Access key id, exported as AWS_ACCESS_KEY_ID
    pub access_key_id: Option<String>,
    /// Secret key, exported as AWS_SECRET_ACCESS_KEY
    pub secret_access_key: Option<String>,
    /// Region, exported as AWS_REGION
    pub region: Option<String>,
}

/// Contents of the credentials file
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Cloud Files section, required
    pub swift: SwiftCredentials,
    /// S3 section, optional
    #[serde(default)]
    pub s3: S3Credentials,
}

impl Credentials {
    /// Load and validate the credentials file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MirrorError::credentials(path, format!("cannot read file: {e}")))?;

        let credentials: Credentials = serde_json::from_str(&raw)
            .map_err(|e| MirrorError::credentials(path, format!("malformed JSON: {e}")))?;

        if credentials.swift.auth_url.is_empty()
            || credentials.swift.username.is_empty()
            || credentials.swift.api_key.is_empty()
        {
            return Err(MirrorError::credentials(
                path,
                "swift section must set auth_url, username, and api_key",
            ));
        }

        Ok(credentials)
    }
}
