//! Scenario parsing and diff planning
//!
//! Turns one `"s3://bucket->cf://container"` directive plus a pair of
//! listings into the minimal set of transfer tasks: objects missing at the
//! destination or present with a different content fingerprint.

use crate::error::{MirrorError, Result};
use crate::storage::{BackendKind, ObjectRecord};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// One requested source-container -> destination-container direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Backend being read from
    pub source: BackendKind,
    /// Container being read from
    pub source_container: String,
    /// Backend being written to
    pub dest: BackendKind,
    /// Container being written to
    pub dest_container: String,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}->{}://{}",
            self.source, self.source_container, self.dest, self.dest_container
        )
    }
}

/// Parse and validate a scenario directive.
///
/// Unknown backend identifiers and same-backend pairs are rejected here so
/// the caller can skip the scenario with a warning; neither is fatal to the
/// run.
pub fn parse_scenario(directive: &str) -> Result<Scenario> {
    let (from, to) = directive
        .split_once("->")
        .ok_or_else(|| MirrorError::InvalidScenario(directive.to_string()))?;

    let (source, source_container) = parse_endpoint(from, directive)?;
    let (dest, dest_container) = parse_endpoint(to, directive)?;

    if source == dest {
        return Err(MirrorError::SameBackend(directive.to_string()));
    }

    Ok(Scenario {
        source,
        source_container,
        dest,
        dest_container,
    })
}

fn parse_endpoint(endpoint: &str, directive: &str) -> Result<(BackendKind, String)> {
    let (kind, container) = endpoint
        .split_once("://")
        .ok_or_else(|| MirrorError::InvalidScenario(directive.to_string()))?;

    let kind: BackendKind = kind.parse()?;
    if container.is_empty() {
        return Err(MirrorError::InvalidScenario(directive.to_string()));
    }
    Ok((kind, container.to_string()))
}

/// Why a source object was left out of the transfer set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Destination already holds an object with the same fingerprint
    SameContent,
    /// Object exceeds the configured maximum size
    TooLarge,
    /// Key is a folder placeholder the destination has no concept of
    Placeholder,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameContent => f.write_str("identical content"),
            Self::TooLarge => f.write_str("too large"),
            Self::Placeholder => f.write_str("folder placeholder"),
        }
    }
}

/// One object copy, created here and consumed exactly once by a worker
#[derive(Debug, Clone)]
pub struct TransferTask {
    /// Run-wide unique id, also the staging-file discriminator
    pub id: u64,
    /// Direction this task belongs to
    pub scenario: Scenario,
    /// Object key to copy
    pub key: String,
    /// Declared size from the source listing
    pub size: u64,
    /// Unique local path, used only when the source requires staging
    pub staging_path: PathBuf,
}

/// The planner's output for one scenario
#[derive(Debug, Default)]
pub struct MirrorPlan {
    /// Tasks in source-listing order
    pub tasks: Vec<TransferTask>,
    /// Skipped keys with the reason, in source-listing order
    pub skips: Vec<(String, SkipReason)>,
}

/// Compute the transfer set for one scenario.
///
/// An object is transferred iff its key is no placeholder, its size is within
/// `max_object_size`, and the destination either lacks the key or holds a
/// different fingerprint. Destination keys are compared exactly as returned.
/// Duplicate listing entries yield at most one task per key.
pub fn plan(
    scenario: &Scenario,
    source_listing: &[ObjectRecord],
    dest_listing: &[ObjectRecord],
    max_object_size: u64,
    staging_dir: &Path,
    next_task_id: &AtomicU64,
) -> MirrorPlan {
    let at_destination: HashMap<&str, &str> = dest_listing
        .iter()
        .map(|record| (record.key.as_str(), record.fingerprint.as_str()))
        .collect();

    let mut plan = MirrorPlan::default();
    let mut planned_keys: HashSet<&str> = HashSet::new();

    for record in source_listing {
        if record.key.ends_with('/') {
            debug!(key = %record.key, "skipping folder placeholder");
            plan.skips.push((record.key.clone(), SkipReason::Placeholder));
            continue;
        }

        if record.size > max_object_size {
            plan.skips.push((record.key.clone(), SkipReason::TooLarge));
            continue;
        }

        if !planned_keys.insert(record.key.as_str()) {
            continue;
        }

        // An explicit presence check: a missing key and a fingerprint
        // mismatch both mean "copy".
        match at_destination.get(record.key.as_str()) {
            Some(fingerprint) if *fingerprint == record.fingerprint => {
                debug!(key = %record.key, "found at destination with matching fingerprint");
                plan.skips.push((record.key.clone(), SkipReason::SameContent));
            }
            found => {
                debug!(
                    key = %record.key,
                    at_destination = found.is_some(),
                    "will be copied"
                );
                let id = next_task_id.fetch_add(1, Ordering::Relaxed);
                plan.tasks.push(TransferTask {
                    id,
                    scenario: scenario.clone(),
                    key: record.key.clone(),
                    size: record.size,
                    staging_path: staging_dir.join(format!("stage.{id}")),
                });
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, size: u64, fingerprint: &str) -> ObjectRecord {
        ObjectRecord {
            key: key.to_string(),
            size,
            fingerprint: fingerprint.to_string(),
            content_type: None,
        }
    }

    fn scenario() -> Scenario {
        parse_scenario("s3://src->cf://dst").unwrap()
    }

    fn run_plan(
        source: &[ObjectRecord],
        dest: &[ObjectRecord],
        max_size: u64,
    ) -> MirrorPlan {
        let ids = AtomicU64::new(0);
        plan(&scenario(), source, dest, max_size, Path::new("/tmp"), &ids)
    }

    #[test]
    fn test_parse_scenario() {
        let s = parse_scenario("cf://backups->s3://backups-mirror").unwrap();
        assert_eq!(s.source, BackendKind::CloudFiles);
        assert_eq!(s.source_container, "backups");
        assert_eq!(s.dest, BackendKind::S3);
        assert_eq!(s.to_string(), "cf://backups->s3://backups-mirror");
    }

    #[test]
    fn test_parse_rejects_malformed_directives() {
        assert!(matches!(
            parse_scenario("s3://a"),
            Err(MirrorError::InvalidScenario(_))
        ));
        assert!(matches!(
            parse_scenario("s3:a->cf://b"),
            Err(MirrorError::InvalidScenario(_))
        ));
        assert!(matches!(
            parse_scenario("s3://->cf://b"),
            Err(MirrorError::InvalidScenario(_))
        ));
        assert!(matches!(
            parse_scenario("gcs://a->cf://b"),
            Err(MirrorError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_parse_rejects_same_backend() {
        assert!(matches!(
            parse_scenario("s3://x->s3://y"),
            Err(MirrorError::SameBackend(_))
        ));
    }

    #[test]
    fn test_diff_correctness() {
        // source {a: fp1, b: fp2}, dest {a: fp1, c: fp9} -> only b copies
        let source = [record("a", 10, "fp1"), record("b", 10, "fp2")];
        let dest = [record("a", 10, "fp1"), record("c", 10, "fp9")];

        let plan = run_plan(&source, &dest, u64::MAX);
        let keys: Vec<_> = plan.tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["b"]);
        assert_eq!(
            plan.skips,
            vec![("a".to_string(), SkipReason::SameContent)]
        );
    }

    #[test]
    fn test_changed_fingerprint_is_copied() {
        let source = [record("a", 10, "fp2")];
        let dest = [record("a", 10, "fp1")];
        let plan = run_plan(&source, &dest, u64::MAX);
        assert_eq!(plan.tasks.len(), 1);
    }

    #[test]
    fn test_size_exclusion() {
        let source = [record("d", 6_000_000_000, "fp1")];
        let plan = run_plan(&source, &[], 5_000_000_000);
        assert!(plan.tasks.is_empty());
        assert_eq!(plan.skips, vec![("d".to_string(), SkipReason::TooLarge)]);
    }

    #[test]
    fn test_placeholder_exclusion() {
        let source = [record("folder/", 0, "fp"), record("folder/file", 1, "fp")];
        let plan = run_plan(&source, &[], u64::MAX);
        let keys: Vec<_> = plan.tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["folder/file"]);
        assert_eq!(plan.skips[0].1, SkipReason::Placeholder);
    }

    #[test]
    fn test_at_most_one_task_per_key() {
        let source = [record("a", 1, "fp1"), record("a", 1, "fp1")];
        let plan = run_plan(&source, &[], u64::MAX);
        assert_eq!(plan.tasks.len(), 1);
    }

    #[test]
    fn test_source_order_preserved() {
        let source = [record("z", 1, "f1"), record("a", 1, "f2"), record("m", 1, "f3")];
        let plan = run_plan(&source, &[], u64::MAX);
        let keys: Vec<_> = plan.tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_staging_paths_are_unique() {
        let source = [record("a", 1, "f1"), record("b", 1, "f2")];
        let plan = run_plan(&source, &[], u64::MAX);
        assert_ne!(plan.tasks[0].staging_path, plan.tasks[1].staging_path);
    }

    #[test]
    fn test_idempotence_after_copy() {
        // Second run with identical listings on both sides plans nothing.
        let listing = [record("a", 10, "fp1"), record("b", 20, "fp2")];
        let plan = run_plan(&listing, &listing, u64::MAX);
        assert!(plan.tasks.is_empty());
        assert_eq!(plan.skips.len(), 2);
        assert!(plan.skips.iter().all(|(_, r)| *r == SkipReason::SameContent));
    }
}
