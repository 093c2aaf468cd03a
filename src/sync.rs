//! One scheduled run: fetch, merge, persist, summarize, publish.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::db::Ledger;
use crate::error::Result;
use crate::history::BoundedHistory;
use crate::ingest::{IngestReport, ingest};
use crate::migrate::{MigrationReport, migrate_history};
use crate::publish::Publisher;
use crate::spotify::PlaySource;
use crate::stats;
use crate::summary;

#[derive(Debug, Default)]
pub struct SyncReport {
    /// Present when the ledger was empty and the history file was imported.
    pub migration: Option<MigrationReport>,
    pub ingest: IngestReport,
    /// Fetched items dropped as malformed.
    pub skipped: usize,
    pub total_plays: u64,
    pub published: bool,
}

/// Run one sync against the configured stores.
///
/// The ledger is committed before the history file is written. A failed file
/// write aborts the run, with the pending file contents logged; the plays are
/// already in the ledger and the next run restores the window. Publishing
/// problems are logged and do not fail the run.
pub fn run_sync(
    settings: &Settings,
    source: &dyn PlaySource,
    publisher: &dyn Publisher,
    today: NaiveDate,
) -> Result<SyncReport> {
    let tz = settings.zone()?;
    let mut report = SyncReport::default();

    let mut ledger = Ledger::open(&settings.ledger.path)?;
    if ledger.is_empty()? {
        report.migration = Some(migrate_history(&mut ledger, &settings.history.path, tz)?);
    }
    info!(play_count = ledger.play_count()?, "Starting sync");

    let mut history =
        BoundedHistory::load(&settings.history.path, settings.history.max_size, tz)?.history;

    let batch = source.recently_played(settings.spotify.fetch_limit)?;
    report.skipped = batch.skipped;
    report.ingest = ingest(&mut history, &mut ledger, batch.plays)?;
    report.total_plays = ledger.play_count()?;

    if !report.ingest.changed_history() && report.ingest.new_plays == 0 {
        info!("Skipping updates - no new plays");
        return Ok(report);
    }

    if let Err(err) = history.save(&settings.history.path, report.total_plays) {
        match history.to_json(report.total_plays) {
            Ok(pending) => error!(
                path = %settings.history.path.display(),
                %pending,
                "History file not written; plays are kept in the ledger"
            ),
            Err(_) => error!(path = %settings.history.path.display(), "History file not written"),
        }
        return Err(err);
    }

    let plays = ledger.plays()?;
    drop(ledger);
    let listening = stats::summarize(report.total_plays, &plays, tz, today, settings.summary.top_n);
    summary::write_markdown(&settings.summary.path, &listening)?;
    info!("Updated summary at {}", settings.summary.path.display());

    let files: Vec<PathBuf> = vec![settings.history.path.clone(), settings.summary.path.clone()];
    match publisher.publish(&files) {
        Ok(published) => report.published = published,
        Err(err) => warn!(%err, "Publishing failed; local files are up to date"),
    }

    info!(
        new = report.ingest.new_plays,
        total = report.total_plays,
        "Sync completed"
    );
    Ok(report)
}
