//! # cloudmirror - S3 <-> Cloud Files mirroring
//!
//! One-way mirroring between Amazon S3 buckets and Cloud Files (OpenStack
//! Swift) containers. Only objects that are new or whose content fingerprint
//! changed are copied, across a bounded pool of parallel transfer workers,
//! with per-object failures reported rather than fatal.
//!
//! ## How a run works
//!
//! For each requested scenario (`"s3://bucket->cf://container"` or the
//! reverse), both sides are listed, the diff planner computes the transfer
//! set, and the tasks go to the shared worker pool. S3 sources stream
//! straight into the Cloud Files upload call; Cloud Files sources are staged
//! through a local file before the S3 upload. A reporter accumulates every
//! outcome into a single report that can be emailed at the end of the run.
//!
//! ```no_run
//! use cloudmirror::config::{CliArgs, MirrorConfig};
//! use cloudmirror::core::MirrorEngine;
//! use cloudmirror::report::Reporter;
//! use cloudmirror::storage::{BackendSet, CloudFilesBackend, S3Backend};
//! use clap::Parser;
//! use std::sync::Arc;
//!
//! let args = CliArgs::parse();
//! let config = MirrorConfig::from_cli(&args);
//! let credentials = cloudmirror::config::Credentials::load(&config.credentials_path)?;
//!
//! let backends = BackendSet::new(vec![
//!     Arc::new(S3Backend::new(credentials.s3.clone())),
//!     Arc::new(CloudFilesBackend::new(credentials.swift.clone())),
//! ]);
//!
//! let mut reporter = Reporter::new(config.debug);
//! MirrorEngine::new(config, backends).run(&mut reporter)?;
//! println!("{}", reporter.into_report());
//! # Ok::<(), cloudmirror::error::MirrorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod notify;
pub mod plan;
pub mod report;
pub mod storage;
pub mod transfer;

pub use config::MirrorConfig;
pub use core::MirrorEngine;
pub use error::{ErrorScope, MirrorError, Result};
pub use report::Reporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
