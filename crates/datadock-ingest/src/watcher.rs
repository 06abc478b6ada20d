use crate::error::IngestError;
use crate::moves::move_to;
use crate::ownership::{extract_username, resolve_owner};
use crate::report::{ErrorReason, FileOutcome, ScanReport};
use datadock_core::{FileKind, IngestSettings, NewDataFile, User};
use datadock_db::{DataFileStore, UserRegistry};
use datadock_storage::{owner_key, Storage};
use datadock_tabular::{cache_original, CacheManager, FillMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use walkdir::WalkDir;

/// A file found in the inbox
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    /// `None` when the file vanished or its metadata is unreadable
    modified: Option<SystemTime>,
}

/// Scans the inbox and moves each stable file through ingestion.
///
/// Files are handled one at a time in path order. A failure only affects the
/// file it happened to; the scan always runs to the end.
pub struct InboxWatcher {
    settings: IngestSettings,
    users: Arc<dyn UserRegistry>,
    records: Arc<dyn DataFileStore>,
    storage: Arc<dyn Storage>,
    cache: CacheManager,
}

impl InboxWatcher {
    pub fn new(
        settings: IngestSettings,
        users: Arc<dyn UserRegistry>,
        records: Arc<dyn DataFileStore>,
        storage: Arc<dyn Storage>,
        cache: CacheManager,
    ) -> Self {
        Self {
            settings,
            users,
            records,
            storage,
            cache,
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Create the inbox, processed and error roots
    pub async fn prepare_dirs(&self) -> Result<(), IngestError> {
        for dir in [
            &self.settings.inbox_dir,
            &self.settings.processed_dir,
            &self.settings.error_dir,
        ] {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub async fn scan_once(&self) -> Result<ScanReport, IngestError> {
        self.scan_once_at(SystemTime::now()).await
    }

    /// One pass over the inbox, judging stability against `now`.
    #[tracing::instrument(skip(self, now), fields(inbox = %self.settings.inbox_dir.display(), dry_run = self.settings.dry_run))]
    pub async fn scan_once_at(&self, now: SystemTime) -> Result<ScanReport, IngestError> {
        let candidates = self.discover().await?;

        let mut report = ScanReport::default();
        for candidate in candidates {
            let outcome = self.process_file(&candidate, now).await;
            report.record(&outcome);
        }

        tracing::info!(
            seen = report.seen,
            ingested = report.ingested,
            duplicates = report.duplicates,
            already_processed = report.already_processed,
            unstable = report.unstable,
            ignored = report.ignored,
            deferred = report.deferred,
            failed = report.failures(),
            cache_failures = report.cache_failures,
            "Inbox scan finished"
        );

        Ok(report)
    }

    /// Every regular file below the inbox, sorted by path
    async fn discover(&self) -> Result<Vec<Candidate>, IngestError> {
        let inbox = self.settings.inbox_dir.clone();

        tokio::task::spawn_blocking(move || {
            let mut candidates: Vec<Candidate> = WalkDir::new(&inbox)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable inbox entry");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| Candidate {
                    modified: entry.metadata().ok().and_then(|m| m.modified().ok()),
                    path: entry.into_path(),
                })
                .collect();
            candidates.sort_by(|a, b| a.path.cmp(&b.path));
            candidates
        })
        .await
        .map_err(|e| IngestError::Task(e.to_string()))
    }

    fn is_stable(&self, modified: Option<SystemTime>, now: SystemTime) -> bool {
        modified
            .and_then(|mtime| now.duration_since(mtime).ok())
            .is_some_and(|age| age >= self.settings.stability_window)
    }

    async fn process_file(&self, candidate: &Candidate, now: SystemTime) -> FileOutcome {
        let path = candidate.path.as_path();

        if FileKind::from_path(path).is_none() {
            tracing::debug!(file = %path.display(), "Ignoring unsupported file");
            return FileOutcome::Ignored;
        }

        if !self.is_stable(candidate.modified, now) {
            tracing::debug!(file = %path.display(), "File not stable yet");
            return FileOutcome::Unstable;
        }

        let Some(username) = extract_username(path) else {
            tracing::error!(file = %path.display(), "No username in filename");
            return self.reject(path, ErrorReason::NoUsername).await;
        };

        let filename = file_name(path);
        let processed = self.settings.processed_dir.join(&username).join(&filename);
        if fs::try_exists(&processed).await.unwrap_or(false) {
            tracing::info!(file = %path.display(), processed = %processed.display(), "Already processed, skipping");
            return FileOutcome::AlreadyProcessed;
        }

        let user = match resolve_owner(self.users.as_ref(), &username).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::error!(file = %path.display(), owner = %username, "No user found for filename");
                return self.reject(path, ErrorReason::NoOwner).await;
            }
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), owner = %username, "User lookup failed, retrying next scan");
                return FileOutcome::Deferred;
            }
        };

        let title = file_stem(path);
        match self.records.exists_for_owner(user.id, &title).await {
            Ok(true) => {
                tracing::info!(file = %path.display(), owner = %user.username, title = %title, "Already in database, skipping");
                if !self.settings.dry_run {
                    self.move_processed(path, &username).await;
                }
                return FileOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), "Duplicate check failed, retrying next scan");
                return FileOutcome::Deferred;
            }
        }

        if self.settings.dry_run {
            tracing::info!(
                file = %path.display(),
                key = %owner_key(user.id, &filename),
                "Dry run: would save to storage and create a record"
            );
            return FileOutcome::DryRun;
        }

        self.ingest(path, &username, &user, &filename, title).await
    }

    async fn ingest(
        &self,
        path: &Path,
        username: &str,
        user: &User,
        filename: &str,
        title: String,
    ) -> FileOutcome {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), "Reading inbox file failed");
                return self.reject(path, ErrorReason::StorageError).await;
            }
        };

        let saved_key = match self
            .storage
            .save(&owner_key(user.id, filename), bytes.clone())
            .await
        {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), "Storage save failed");
                return self.reject(path, ErrorReason::StorageError).await;
            }
        };

        let created = self
            .records
            .create(NewDataFile {
                owner_id: user.id,
                title,
                file_path: saved_key.clone(),
            })
            .await;
        let record = match created {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, file = %path.display(), "Record creation failed");
                if let Err(e) = self.storage.delete(&saved_key).await {
                    tracing::error!(error = %e, key = %saved_key, "Failed to delete saved bytes after record failure");
                }
                return self.reject(path, ErrorReason::DbError).await;
            }
        };

        let cache = self.cache.clone();
        let cached_record = record.clone();
        let cache_ok = match tokio::task::spawn_blocking(move || {
            cache_original(&cache, &cached_record, bytes, FillMode::IfMissing)
        })
        .await
        {
            Ok(Ok(report)) => report.failed.is_empty(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, record_id = %record.id, "Cache build during ingest failed");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, record_id = %record.id, "Cache build task failed");
                false
            }
        };

        self.move_processed(path, username).await;

        tracing::info!(
            file = %path.display(),
            owner = %user.username,
            record_id = %record.id,
            key = %record.file_path,
            cache_ok,
            "File ingested"
        );

        FileOutcome::Ingested {
            record_id: record.id,
            cache_ok,
        }
    }

    /// Route a file to `error/<reason>/`; in dry-run mode only report it.
    async fn reject(&self, path: &Path, reason: ErrorReason) -> FileOutcome {
        if !self.settings.dry_run {
            if let Err(e) = move_to(&self.settings.error_dir, path, Some(reason.as_str())).await {
                tracing::error!(error = %e, file = %path.display(), reason = %reason, "Failed to move file to error directory");
            }
        }
        FileOutcome::Failed(reason)
    }

    async fn move_processed(&self, path: &Path, username: &str) {
        if let Err(e) = move_to(&self.settings.processed_dir, path, Some(username)).await {
            tracing::error!(error = %e, file = %path.display(), "Failed to move file to processed directory");
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
