//! One-off import of the flat history file into the ledger.

use std::path::Path;

use chrono_tz::Tz;
use tracing::info;

use crate::db::Ledger;
use crate::error::Result;
use crate::history::BoundedHistory;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Rows created in the ledger.
    pub imported: usize,
    /// File entries that could not be read.
    pub skipped: usize,
    /// Counter value taken from the file, when the ledger counter was still 0.
    pub seeded_total: Option<u64>,
}

/// Copy every entry of the history file into the ledger. Entries already
/// there are left alone, so running this again is a no-op. The play counter
/// is not raised for imported rows: those plays were counted when first seen.
pub fn migrate_history(ledger: &mut Ledger, path: &Path, tz: Tz) -> Result<MigrationReport> {
    let loaded = BoundedHistory::load(path, usize::MAX, tz)?;
    let imported = ledger.import_plays(loaded.history.entries())?;

    let seeded_total = if loaded.recorded_total > 0 && ledger.seed_play_count(loaded.recorded_total)? {
        Some(loaded.recorded_total)
    } else {
        None
    };

    if imported > 0 || seeded_total.is_some() {
        info!(
            imported,
            skipped = loaded.skipped,
            seeded_total,
            "Migrated history file into ledger"
        );
    }
    Ok(MigrationReport {
        imported,
        skipped: loaded.skipped,
        seeded_total,
    })
}
