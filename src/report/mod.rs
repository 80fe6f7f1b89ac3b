//! Run reporting
//!
//! The reporter owns the run's accumulated log text and per-scenario
//! outcome tallies. Every line also goes to `tracing` at the matching
//! level; Info and above additionally land in the report body that is
//! flushed exactly once at the end of the run.

use crate::plan::SkipReason;
use crate::transfer::{TransferOutcome, TransferStatus};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Log severity, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-decision noise, kept out of the report body
    Debug,
    /// Normal progress, included in the report
    Info,
    /// Recoverable problem (skipped scenario or failed object)
    Warning,
    /// Setup failure that terminates the run
    Critical,
}

/// Per-scenario outcome counters
#[derive(Debug, Default, Clone)]
pub struct ScenarioTally {
    /// Objects copied to the destination
    pub copied: u64,
    /// Bytes moved by the copied objects
    pub bytes_copied: u64,
    /// Objects whose fingerprint already matched
    pub skipped_same_content: u64,
    /// Objects over the configured size limit
    pub skipped_too_large: u64,
    /// Folder placeholders left behind
    pub skipped_placeholder: u64,
    /// Failed keys with their reason
    pub failed: Vec<(String, String)>,
}

impl ScenarioTally {
    /// Total objects skipped for any reason
    pub fn skipped(&self) -> u64 {
        self.skipped_same_content + self.skipped_too_large + self.skipped_placeholder
    }
}

/// Accumulates log lines and outcome counts for the lifetime of one run
pub struct Reporter {
    debug_echo: bool,
    started: DateTime<Local>,
    body: String,
    // Scenario labels in first-seen order; tallies looked up by label.
    order: Vec<String>,
    tallies: HashMap<String, ScenarioTally>,
}

impl Reporter {
    /// Create a reporter; `debug_echo` additionally prints Debug lines to
    /// stdout as the run progresses
    pub fn new(debug_echo: bool) -> Self {
        let mut reporter = Self {
            debug_echo,
            started: Local::now(),
            body: String::new(),
            order: Vec::new(),
            tallies: HashMap::new(),
        };
        reporter.log(
            Severity::Info,
            format!(
                "Cloud mirror run started at {}",
                reporter.started.format("%Y-%m-%d %H:%M:%S")
            ),
        );
        reporter
    }

    /// Record one log line at the given severity
    pub fn log(&mut self, severity: Severity, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        match severity {
            Severity::Critical => error!("{msg}"),
            Severity::Warning => warn!("{msg}"),
            Severity::Info => info!("{msg}"),
            Severity::Debug => debug!("{msg}"),
        }

        if self.debug_echo && severity == Severity::Debug {
            println!("{msg}");
        }
        if severity >= Severity::Info {
            self.body.push_str(msg);
            self.body.push('\n');
        }
    }

    /// Announce a scenario so it appears in the summary even with no tasks
    pub fn begin_scenario(&mut self, label: &str) {
        self.tally_mut(label);
        self.log(Severity::Info, format!("\nScenario: {label}"));
    }

    /// Record a planner-level skip
    pub fn record_skip(&mut self, label: &str, key: &str, reason: SkipReason) {
        match reason {
            SkipReason::TooLarge => {
                self.log(
                    Severity::Warning,
                    format!("Skipping {key} because it is too large"),
                );
                self.tally_mut(label).skipped_too_large += 1;
            }
            SkipReason::SameContent => {
                self.log(
                    Severity::Debug,
                    format!("{key} found at destination with matching fingerprint"),
                );
                self.tally_mut(label).skipped_same_content += 1;
            }
            SkipReason::Placeholder => {
                self.log(Severity::Debug, format!("{key} is a folder placeholder"));
                self.tally_mut(label).skipped_placeholder += 1;
            }
        }
    }

    /// Record a worker outcome
    pub fn record_outcome(&mut self, outcome: &TransferOutcome) {
        match &outcome.status {
            TransferStatus::Succeeded => {
                self.log(
                    Severity::Info,
                    format!("Copied {} to destination", outcome.key),
                );
                let tally = self.tally_mut(&outcome.scenario);
                tally.copied += 1;
                tally.bytes_copied += outcome.bytes;
            }
            TransferStatus::Failed(detail) => {
                self.log(
                    Severity::Warning,
                    format!("Error in copying {}: {detail}", outcome.key),
                );
                self.tally_mut(&outcome.scenario)
                    .failed
                    .push((outcome.key.clone(), detail.clone()));
            }
            TransferStatus::Skipped(reason) => {
                let (key, reason) = (outcome.key.clone(), *reason);
                self.record_skip(&outcome.scenario.clone(), &key, reason);
            }
        }
    }

    /// Tally for one scenario label, if any outcomes were recorded
    pub fn tally(&self, label: &str) -> Option<&ScenarioTally> {
        self.tallies.get(label)
    }

    /// True when no scenario recorded a failed object
    pub fn all_transfers_succeeded(&self) -> bool {
        self.tallies.values().all(|t| t.failed.is_empty())
    }

    fn tally_mut(&mut self, label: &str) -> &mut ScenarioTally {
        if !self.tallies.contains_key(label) {
            self.order.push(label.to_string());
        }
        self.tallies.entry(label.to_string()).or_default()
    }

    /// Consume the reporter, producing the final report text
    pub fn into_report(mut self) -> String {
        let ended = Local::now();
        let mut summary = String::from("\nSummary:\n");
        for label in &self.order {
            let tally = &self.tallies[label];
            summary.push_str(&format!(
                "  {label}: {} copied ({}), {} skipped, {} failed\n",
                tally.copied,
                humansize::format_size(tally.bytes_copied, humansize::BINARY),
                tally.skipped(),
                tally.failed.len(),
            ));
            for (key, detail) in &tally.failed {
                summary.push_str(&format!("    failed: {key} ({detail})\n"));
            }
        }
        self.body.push_str(&summary);
        self.body.push_str(&format!(
            "\nCloud mirror run ended at {}\n",
            ended.format("%Y-%m-%d %H:%M:%S")
        ));
        self.body
    }
}
