//! cloudmirror CLI
//!
//! Exit status is nonzero only for setup failures (credentials, backend
//! connectivity) before any transfer work begins; individual object failures
//! are reported, not fatal.

use clap::Parser;
use cloudmirror::config::{CliArgs, Credentials, MirrorConfig};
use cloudmirror::core::MirrorEngine;
use cloudmirror::error::Result;
use cloudmirror::notify;
use cloudmirror::report::{Reporter, Severity};
use cloudmirror::storage::{BackendSet, CloudFilesBackend, S3Backend, StorageBackend};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = MirrorConfig::from_cli(&args);

    if let Err(e) = run(config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(config: MirrorConfig) -> Result<()> {
    let mut reporter = Reporter::new(config.debug);
    reporter.log(Severity::Debug, "Connecting to cloud service providers");

    // Credentials and connectivity problems are fatal here, before any
    // listing is attempted.
    let credentials = match Credentials::load(&config.credentials_path) {
        Ok(credentials) => credentials,
        Err(e) => {
            reporter.log(Severity::Critical, e.to_string());
            return Err(e);
        }
    };

    let s3: Arc<dyn StorageBackend> = Arc::new(S3Backend::new(credentials.s3.clone()));
    let cf: Arc<dyn StorageBackend> =
        Arc::new(CloudFilesBackend::new(credentials.swift.clone()));

    for backend in [&s3, &cf] {
        if let Err(e) = backend.verify_connection() {
            reporter.log(Severity::Critical, e.to_string());
            return Err(e);
        }
    }

    let backends = BackendSet::new(vec![s3, cf]);
    let engine = MirrorEngine::new(config.clone(), backends);
    engine.run(&mut reporter)?;

    let report = reporter.into_report();
    print!("{report}");

    // Delivery problems are worth a warning but never change the exit
    // status; the report was already printed.
    if let Err(e) = notify::for_settings(&config.email).deliver(&report) {
        tracing::warn!("could not deliver report: {e}");
    }

    Ok(())
}
