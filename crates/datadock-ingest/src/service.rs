use crate::error::IngestError;
use crate::report::ScanReport;
use crate::watcher::InboxWatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Runs the inbox watcher on a fixed interval
#[derive(Clone)]
pub struct IngestService {
    watcher: Arc<InboxWatcher>,
    interval: Duration,
}

impl IngestService {
    pub fn new(watcher: Arc<InboxWatcher>) -> Self {
        let interval = watcher.settings().poll_interval;
        Self { watcher, interval }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Single scan pass, for external schedulers
    pub async fn run_once(&self) -> Result<ScanReport, IngestError> {
        self.watcher.prepare_dirs().await?;
        self.watcher.scan_once().await
    }

    /// Start the background scan loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.watcher.prepare_dirs().await {
                tracing::error!(error = %e, "Failed to create ingest directories");
            }

            let mut scan_interval = interval(self.interval);
            scan_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(interval_secs = self.interval.as_secs(), "Ingest service started");

            loop {
                scan_interval.tick().await;

                if let Err(e) = self.watcher.scan_once().await {
                    tracing::error!(error = %e, "Inbox scan failed");
                }
            }
        })
    }
}
