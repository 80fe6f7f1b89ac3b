//! CLI arguments and the assembled run configuration

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// cloudmirror - mirror S3 buckets and Cloud Files containers
#[derive(Parser, Debug, Clone)]
#[command(name = "cloudmirror")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "One-way mirroring between S3 buckets and Cloud Files containers")]
#[command(long_about = r#"
Mirrors objects between Amazon S3 and Cloud Files, copying only objects that
are new or whose content fingerprint changed, with a bounded pool of parallel
transfer workers. Individual object failures are reported, not fatal.

Examples:
  cloudmirror "s3://photos->cf://photos"
  cloudmirror "cf://backups->s3://backups" --workers 8
  cloudmirror "s3://a->cf://a" "cf://b->s3://b" --from ops@example.com --to me@example.com
"#)]
pub struct CliArgs {
    /// Synchronization scenarios, e.g. "s3://bucket->cf://container"
    #[arg(value_name = "SCENARIO", required = true)]
    pub sync: Vec<String>,

    /// Number of simultaneous transfer workers (0 = one per CPU)
    #[arg(short = 'w', long, default_value = "4", value_name = "NUM")]
    pub workers: usize,

    /// Maximum object size to mirror, in bytes; larger objects are skipped
    #[arg(long = "max-size", default_value = "5368709120", value_name = "BYTES")]
    pub max_size: u64,

    /// Email address the status report is sent from
    #[arg(long = "from", value_name = "ADDR")]
    pub email_from: Option<String>,

    /// Comma-separated recipient addresses for the status report
    #[arg(long = "to", value_name = "ADDRS")]
    pub email_to: Option<String>,

    /// Subject of the status email
    #[arg(long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Directory for staging files on the cf->s3 path
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Path to the JSON credentials file
    #[arg(long, default_value = "/etc/cloudmirror/credentials.json", value_name = "PATH")]
    pub credentials: PathBuf,

    /// Seconds to wait between completion polls of the worker pool
    #[arg(long, default_value = "5", value_name = "SECS")]
    pub poll_interval: u64,

    /// Echo debug-level report lines to stdout
    #[arg(long)]
    pub debug: bool,
}

/// Status email settings; delivery is skipped unless both addresses are set
#[derive(Debug, Clone)]
pub struct EmailSettings {
    /// Sender address
    pub from: Option<String>,
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
}

/// Assembled configuration for one run
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Scenario strings exactly as given on the command line
    pub scenarios: Vec<String>,
    /// Bounded worker-pool size
    pub workers: usize,
    /// Objects larger than this are skipped, not copied
    pub max_object_size: u64,
    /// Directory holding per-task staging files
    pub staging_dir: PathBuf,
    /// Credentials file location
    pub credentials_path: PathBuf,
    /// Completion-poll cadence for the worker pool
    pub poll_interval: Duration,
    /// Status email settings
    pub email: EmailSettings,
    /// Echo debug report lines to stdout
    pub debug: bool,
}

impl MirrorConfig {
    /// Build the run configuration from parsed CLI arguments
    pub fn from_cli(args: &CliArgs) -> Self {
        let workers = if args.workers == 0 {
            num_cpus::get()
        } else {
            args.workers
        };

        let subject = args.subject.clone().unwrap_or_else(|| {
            format!(
                "[Cloud Mirror] Run at {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            )
        });

        let to = args
            .email_to
            .as_deref()
            .map(|addrs| {
                addrs
                    .split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            scenarios: args.sync.clone(),
            workers,
            max_object_size: args.max_size,
            staging_dir: args
                .staging_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("cloudmirror")),
            credentials_path: args.credentials.clone(),
            poll_interval: Duration::from_secs(args.poll_interval),
            email: EmailSettings {
                from: args.email_from.clone(),
                to,
                subject,
            },
            debug: args.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["cloudmirror", "s3://a->cf://a"]);
        let config = MirrorConfig::from_cli(&args);

        assert_eq!(config.workers, 4);
        assert_eq!(config.max_object_size, 5_368_709_120);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.email.to.is_empty());
        assert!(!config.debug);
        assert_eq!(config.scenarios, vec!["s3://a->cf://a".to_string()]);
    }

    #[test]
    fn test_zero_workers_autodetects() {
        let args = parse(&["cloudmirror", "--workers", "0", "s3://a->cf://a"]);
        let config = MirrorConfig::from_cli(&args);
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_recipient_list_splits_on_commas() {
        let args = parse(&[
            "cloudmirror",
            "--to",
            "a@example.com, b@example.com,",
            "s3://a->cf://a",
        ]);
        let config = MirrorConfig::from_cli(&args);
        assert_eq!(config.email.to, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_scenarios_are_required() {
        assert!(CliArgs::try_parse_from(["cloudmirror"]).is_err());
    }

    #[test]
    fn test_multiple_scenarios() {
        let args = parse(&["cloudmirror", "s3://a->cf://a", "cf://b->s3://b"]);
        assert_eq!(args.sync.len(), 2);
    }
}
