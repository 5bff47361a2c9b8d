pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod report;
pub mod source;
pub mod types;

use chrono::{Duration, Utc};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::source::EventSource;

/// Run one full sync: ensure schema, fetch the trailing window, normalize,
/// load, and print the summary report.
///
/// The pipeline is strictly sequential: fetching completes across all pages
/// before normalization starts, and normalization completes before loading.
/// Load failures after the fetch phase are logged and the run still reports
/// whatever is committed.
pub async fn run(source: &impl EventSource, config: &SyncConfig) -> Result<(), SyncError> {
    let mut conn = db::open(&config.db_path)?;
    db::init_schema(&conn)?;

    let end = Utc::now();
    let start = end - Duration::days(config.lookback_days);
    log::info!(
        "📅 Syncing financial events from {} to {}",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    );

    let raw_events = source.fetch(start, end).await;
    if raw_events.is_empty() {
        log::info!("No financial events found for the specified period");
        return Ok(());
    }

    let transactions = normalizer::normalize(&raw_events)?;

    match loader::load(&mut conn, &transactions) {
        Ok(outcome) => log::info!(
            "✅ Load complete: {} inserted, {} duplicates skipped, {} failed",
            outcome.inserted,
            outcome.duplicates,
            outcome.failed
        ),
        Err(e) => log::error!("❌ Database load failed: {}", e),
    }

    let summaries = report::summarize(&conn)?;
    report::print_summary(&summaries);

    Ok(())
}
