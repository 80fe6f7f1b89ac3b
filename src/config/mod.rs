//! Configuration for a mirroring run
//!
//! CLI arguments, the JSON credentials file, and the assembled run
//! configuration handed to the engine.

mod credentials;
mod settings;

pub use credentials::{Credentials, S3Credentials, SwiftCredentials};
pub use settings::{CliArgs, EmailSettings, MirrorConfig};
