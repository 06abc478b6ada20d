//! Helpers shared by the `datadock` command line tool

use datadock_ingest::ScanReport;
use datadock_tabular::SheetFillReport;

/// Install a plain fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// One-line summary of a scan pass
pub fn scan_summary(report: &ScanReport) -> String {
    let mut line = format!(
        "seen={} ingested={} duplicates={} already_processed={} unstable={} ignored={} deferred={}",
        report.seen,
        report.ingested,
        report.duplicates,
        report.already_processed,
        report.unstable,
        report.ignored,
        report.deferred,
    );
    if report.dry_run > 0 {
        line.push_str(&format!(" dry_run={}", report.dry_run));
    }
    if report.cache_failures > 0 {
        line.push_str(&format!(" cache_failures={}", report.cache_failures));
    }
    for (reason, count) in &report.failed {
        line.push_str(&format!(" error/{}={}", reason, count));
    }
    line
}

/// Sheets touched by a cache refresh
pub fn fill_summary(report: &SheetFillReport) -> String {
    let list = |sheets: &[String]| {
        if sheets.is_empty() {
            "-".to_string()
        } else {
            sheets.join(", ")
        }
    };
    format!(
        "written: {}; empty: {}; failed: {}",
        list(&report.written),
        list(&report.empty),
        list(&report.failed)
    )
}
