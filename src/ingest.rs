//! Merging a freshly fetched batch into the recent window and the ledger.

use tracing::{debug, error, info};

use crate::db::Ledger;
use crate::error::Result;
use crate::history::{self, BoundedHistory};
use crate::track::Track;

/// Outcome of one merge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Plays offered by the fetch, before any deduplication.
    pub fetched: usize,
    /// Plays the ledger had never seen; the counter rose by this much.
    pub new_plays: usize,
    /// Plays placed into the recent window.
    pub appended: usize,
    /// Oldest window entries dropped to respect the cap.
    pub evicted: usize,
}

impl IngestReport {
    pub fn changed_history(&self) -> bool {
        self.appended > 0 || self.evicted > 0
    }
}

/// Merge `batch` into both stores.
///
/// The ledger is written (and committed) first; the window is updated in
/// memory only and the caller persists it. If the ledger write fails, the
/// fetched plays are logged before the error is returned. A play enters the window when it is
/// not already there and either the ledger had not seen it, or it is newer
/// than everything in the window. The second case rebuilds the window after a
/// run whose ledger commit succeeded but whose file write did not.
pub fn ingest(
    history: &mut BoundedHistory,
    ledger: &mut Ledger,
    batch: Vec<Track>,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        fetched: batch.len(),
        ..Default::default()
    };

    let plays = chronological_unique(batch);
    let inserted = match ledger.record_plays(&plays) {
        Ok(inserted) => inserted,
        Err(err) => {
            log_unrecorded(&plays);
            return Err(err);
        }
    };
    report.new_plays = inserted.iter().filter(|&&b| b).count();

    let newest = history.latest().map(Track::played_at);
    for (play, is_new) in plays.into_iter().zip(inserted) {
        if history.contains(&play) {
            continue;
        }
        if is_new || newest.is_none_or(|ts| play.played_at() > ts) {
            debug!(track = %play.track(), played_at = %play.played_at(), "Adding play to history");
            history.insert_chronological(play);
            report.appended += 1;
        }
    }
    report.evicted = history.enforce_cap().len();

    if report.new_plays == 0 && report.appended == 0 {
        info!(fetched = report.fetched, "No new plays");
    } else {
        info!(
            fetched = report.fetched,
            new = report.new_plays,
            appended = report.appended,
            evicted = report.evicted,
            "Merged fetched plays"
        );
    }
    Ok(report)
}

fn log_unrecorded(plays: &[Track]) {
    match history::tracks_json(plays) {
        Ok(pending) => error!(
            count = plays.len(),
            %pending,
            "Ledger not updated; fetched plays were not recorded"
        ),
        Err(_) => error!(count = plays.len(), "Ledger not updated; fetched plays were not recorded"),
    }
}

/// Oldest first, with repeats inside the batch collapsed.
fn chronological_unique(mut batch: Vec<Track>) -> Vec<Track> {
    batch.sort_by_key(Track::played_at);
    let mut unique: Vec<Track> = Vec::with_capacity(batch.len());
    for play in batch {
        if !unique.iter().any(|seen| seen.same_play(&play)) {
            unique.push(play);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{Precision, parse_utc};
    use chrono::{Duration, TimeZone, Utc};

    fn play_at(name: &str, minute: i64) -> Track {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Track::new(name, vec!["Artist".into()], "Album", base + Duration::minutes(minute))
    }

    /// Most recent first, as the upstream API returns them.
    fn fetched(range: std::ops::Range<i64>) -> Vec<Track> {
        range.rev().map(|m| play_at(&format!("t{m}"), m)).collect()
    }

    fn names(h: &BoundedHistory) -> Vec<String> {
        h.entries().iter().map(|t| t.track().to_string()).collect()
    }

    #[test]
    fn first_ingest_appends_in_chronological_order() {
        let mut history = BoundedHistory::new(10);
        let mut ledger = Ledger::open_in_memory().unwrap();

        let report = ingest(&mut history, &mut ledger, fetched(0..3)).unwrap();

        assert_eq!(report.new_plays, 3);
        assert_eq!(report.appended, 3);
        assert_eq!(names(&history), ["t0", "t1", "t2"]);
        assert_eq!(ledger.play_count().unwrap(), 3);
    }

    #[test]
    fn reingesting_same_batch_changes_nothing() {
        let mut history = BoundedHistory::new(10);
        let mut ledger = Ledger::open_in_memory().unwrap();
        ingest(&mut history, &mut ledger, fetched(0..5)).unwrap();

        let report = ingest(&mut history, &mut ledger, fetched(0..5)).unwrap();

        assert_eq!(report.new_plays, 0);
        assert!(!report.changed_history());
        assert_eq!(history.len(), 5);
        assert_eq!(ledger.play_count().unwrap(), 5);
        assert_eq!(ledger.track_count().unwrap(), 5);
    }

    #[test]
    fn overlapping_batches_only_count_the_new_tail() {
        let mut history = BoundedHistory::new(10);
        let mut ledger = Ledger::open_in_memory().unwrap();
        let first = ingest(&mut history, &mut ledger, fetched(0..4)).unwrap();
        let second = ingest(&mut history, &mut ledger, fetched(2..7)).unwrap();

        assert_eq!(second.new_plays, 3);
        assert_eq!(
            ledger.play_count().unwrap(),
            (first.new_plays + second.new_plays) as u64
        );
        assert_eq!(names(&history), ["t0", "t1", "t2", "t3", "t4", "t5", "t6"]);
    }

    #[test]
    fn window_never_exceeds_cap_and_drops_oldest() {
        let mut history = BoundedHistory::new(4);
        let mut ledger = Ledger::open_in_memory().unwrap();
        let mut total_new = 0;

        for start in (0..30).step_by(3) {
            let report = ingest(&mut history, &mut ledger, fetched(start..start + 5)).unwrap();
            total_new += report.new_plays;
            assert!(history.len() <= 4);
        }

        assert_eq!(names(&history), ["t28", "t29", "t30", "t31"]);
        assert_eq!(ledger.play_count().unwrap(), total_new as u64);
        assert_eq!(total_new, 32);
    }

    #[test]
    fn evicted_plays_do_not_reenter_a_small_window() {
        let mut history = BoundedHistory::new(2);
        let mut ledger = Ledger::open_in_memory().unwrap();
        ingest(&mut history, &mut ledger, fetched(0..5)).unwrap();
        assert_eq!(names(&history), ["t3", "t4"]);

        let report = ingest(&mut history, &mut ledger, fetched(0..5)).unwrap();
        assert_eq!(report.appended, 0);
        assert_eq!(names(&history), ["t3", "t4"]);
    }

    #[test]
    fn lost_window_is_rebuilt_without_recounting() {
        let mut ledger = Ledger::open_in_memory().unwrap();
        ingest(&mut BoundedHistory::new(10), &mut ledger, fetched(0..3)).unwrap();

        // the file write of the previous run never happened
        let mut history = BoundedHistory::new(10);
        let report = ingest(&mut history, &mut ledger, fetched(0..3)).unwrap();

        assert_eq!(report.new_plays, 0);
        assert_eq!(report.appended, 3);
        assert_eq!(ledger.play_count().unwrap(), 3);
    }

    #[test]
    fn duplicates_inside_a_batch_count_once() {
        let mut history = BoundedHistory::new(10);
        let mut ledger = Ledger::open_in_memory().unwrap();
        let batch = vec![play_at("t1", 1), play_at("t1", 1), play_at("t0", 0)];

        let report = ingest(&mut history, &mut ledger, batch).unwrap();
        assert_eq!(report.new_plays, 2);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn empty_batch_is_not_an_error() {
        let mut history = BoundedHistory::new(10);
        let mut ledger = Ledger::open_in_memory().unwrap();
        let report = ingest(&mut history, &mut ledger, Vec::new()).unwrap();
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn late_arrival_is_slotted_between_existing_entries() {
        let t = |s: &str| parse_utc(s).unwrap();
        let mut history = BoundedHistory::from_tracks(
            10,
            vec![
                Track::new("a", vec![], "", t("2024-01-01T10:00:00Z")),
                Track::new("c", vec![], "", t("2024-01-01T12:00:00Z")),
            ],
        );
        let mut ledger = Ledger::open_in_memory().unwrap();
        ledger.import_plays(history.entries()).unwrap();

        let late = Track::new("b", vec![], "", t("2024-01-01T11:00:00Z"));
        let report = ingest(&mut history, &mut ledger, vec![late]).unwrap();

        assert_eq!(report.new_plays, 1);
        assert_eq!(names(&history), ["a", "b", "c"]);
    }

    #[test]
    fn refetched_legacy_play_is_neither_counted_nor_repeated() {
        let t = |s: &str| parse_utc(s).unwrap();
        let legacy = Track::new("a", vec!["X".into()], "", t("2024-03-04T18:00:00Z"))
            .with_precision(Precision::Seconds);
        let mut history = BoundedHistory::from_tracks(10, vec![legacy]);
        let mut ledger = Ledger::open_in_memory().unwrap();
        ledger.import_plays(history.entries()).unwrap();
        ledger.seed_play_count(1).unwrap();

        let refetched = Track::new("a", vec!["X".into()], "", t("2024-03-04T18:00:00.512Z"));
        let report = ingest(&mut history, &mut ledger, vec![refetched]).unwrap();

        assert_eq!(report.new_plays, 0);
        assert_eq!(report.appended, 0);
        assert_eq!(history.len(), 1);
        assert_eq!(ledger.play_count().unwrap(), 1);
        assert_eq!(ledger.track_count().unwrap(), 1);
    }
}
