//! Per-file outcomes and scan summaries

use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Why a file was routed to the error tree; doubles as the subdirectory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorReason {
    NoUsername,
    NoOwner,
    StorageError,
    DbError,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::NoUsername => "no_username",
            ErrorReason::NoOwner => "no_owner",
            ErrorReason::StorageError => "storage_error",
            ErrorReason::DbError => "db_error",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one inbox file during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Extension not supported; left untouched
    Ignored,
    /// Modified within the stability window; retried next scan
    Unstable,
    /// A file with the same name was already processed for this user; left in the inbox
    AlreadyProcessed,
    /// The owner already has a record with this title; moved to processed
    Duplicate,
    /// Moved to `error/<reason>/`
    Failed(ErrorReason),
    /// A registry or record store lookup failed; left in place and retried
    Deferred,
    Ingested { record_id: Uuid, cache_ok: bool },
    /// Would have been ingested; nothing was changed
    DryRun,
}

/// Counters for one pass over the inbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub seen: usize,
    pub ingested: usize,
    pub duplicates: usize,
    pub already_processed: usize,
    pub unstable: usize,
    pub ignored: usize,
    pub deferred: usize,
    pub dry_run: usize,
    /// Ingested files whose cache build failed
    pub cache_failures: usize,
    pub failed: BTreeMap<ErrorReason, usize>,
}

impl ScanReport {
    pub fn record(&mut self, outcome: &FileOutcome) {
        self.seen += 1;
        match outcome {
            FileOutcome::Ignored => self.ignored += 1,
            FileOutcome::Unstable => self.unstable += 1,
            FileOutcome::AlreadyProcessed => self.already_processed += 1,
            FileOutcome::Duplicate => self.duplicates += 1,
            FileOutcome::Failed(reason) => *self.failed.entry(*reason).or_default() += 1,
            FileOutcome::Deferred => self.deferred += 1,
            FileOutcome::Ingested { cache_ok, .. } => {
                self.ingested += 1;
                if !cache_ok {
                    self.cache_failures += 1;
                }
            }
            FileOutcome::DryRun => self.dry_run += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.failed.values().sum()
    }
}
