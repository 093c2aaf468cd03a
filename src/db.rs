use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use tracing::{debug, warn};

use crate::error::{Result, TrackerError};
use crate::track::{self, Precision, Track};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS play_count (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    count INTEGER NOT NULL
);
INSERT OR IGNORE INTO play_count (id, count) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    track TEXT NOT NULL,
    artists TEXT NOT NULL,
    primary_artist TEXT NOT NULL,
    album TEXT NOT NULL,
    played_at TEXT NOT NULL,
    played_at_sec TEXT NOT NULL,
    whole_seconds INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (track, artists, played_at)
);

CREATE INDEX IF NOT EXISTS idx_tracks_played_at ON tracks(played_at);
CREATE INDEX IF NOT EXISTS idx_tracks_primary_artist ON tracks(primary_artist);
CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album);
CREATE INDEX IF NOT EXISTS idx_tracks_track ON tracks(track);
CREATE INDEX IF NOT EXISTS idx_tracks_played_at_sec ON tracks(track, played_at_sec);
"#;

/// The lifetime ledger: a running play counter plus every play ever seen.
pub struct Ledger {
    conn: Connection,
}

/// Ledger operations
impl Ledger {
    /// Open or create the ledger at the given path and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TrackerError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an existing ledger for reporting. Nothing can be written through it.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// The cumulative number of plays counted by syncs.
    pub fn play_count(&self) -> Result<u64> {
        let count: Option<i64> = self
            .conn
            .query_row("SELECT count FROM play_count WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// Get the total number of plays stored in the ledger
    pub fn track_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.track_count()? == 0)
    }

    /// Insert plays and raise the counter by the number of rows actually
    /// created, in one transaction. The returned flags line up with `plays`:
    /// `true` where the play was not already in the ledger.
    pub fn record_plays(&mut self, plays: &[Track]) -> Result<Vec<bool>> {
        let tx = self.conn.transaction()?;
        let inserted = insert_all(&tx, plays)?;
        let new = inserted.iter().filter(|&&b| b).count() as i64;
        if new > 0 {
            tx.execute(
                "UPDATE play_count SET count = count + ?1 WHERE id = 1",
                params![new],
            )?;
        }
        tx.commit()?;
        debug!(offered = plays.len(), new, "Recorded plays in ledger");
        Ok(inserted)
    }

    /// Insert plays without touching the counter. Used for imports of plays
    /// that were already counted elsewhere. Returns how many rows were created.
    pub fn import_plays(&mut self, plays: &[Track]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let inserted = insert_all(&tx, plays)?;
        tx.commit()?;
        Ok(inserted.into_iter().filter(|&b| b).count())
    }

    /// Set the counter to `count` only if it has never been raised.
    /// Returns whether the value was applied.
    pub fn seed_play_count(&self, count: u64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE play_count SET count = ?1 WHERE id = 1 AND count = 0",
            params![count as i64],
        )?;
        Ok(changed > 0)
    }

    /// Every play in the ledger, oldest first.
    pub fn plays(&self) -> Result<Vec<Track>> {
        let mut stmt = self.conn.prepare(
            "SELECT track, artists, album, played_at, whole_seconds
             FROM tracks ORDER BY played_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
            ))
        })?;

        let mut plays = Vec::new();
        for row in rows {
            let (name, artists_json, album, played_at, whole_seconds) = row?;
            let artists: Vec<String> = match serde_json::from_str(&artists_json) {
                Ok(artists) => artists,
                Err(err) => {
                    warn!(track = %name, %err, "Unreadable artist list in ledger row");
                    continue;
                }
            };
            match track::parse_utc(&played_at) {
                Some(ts) => {
                    let precision = if whole_seconds {
                        Precision::Seconds
                    } else {
                        Precision::Millis
                    };
                    plays.push(Track::new(name, artists, album, ts).with_precision(precision));
                }
                None => warn!(track = %name, %played_at, "Unreadable timestamp in ledger row"),
            }
        }
        Ok(plays)
    }
}

/// Exact duplicates are caught by the UNIQUE constraint. A play with only
/// whole-second precision, or one meeting a stored whole-second row, also
/// matches anything with the same title and credits in the same second.
fn insert_all(tx: &Transaction<'_>, plays: &[Track]) -> Result<Vec<bool>> {
    let mut coarse_match = tx.prepare_cached(
        "SELECT EXISTS (
             SELECT 1 FROM tracks
             WHERE track = ?1 AND artists = ?2 AND played_at_sec = ?3
               AND (whole_seconds = 1 OR ?4 = 1)
         )",
    )?;
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO tracks
             (track, artists, primary_artist, album, played_at, played_at_sec, whole_seconds)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut inserted = Vec::with_capacity(plays.len());
    for play in plays {
        let artists = serde_json::Value::from(play.artists().to_vec()).to_string();
        let second = track::format_played_at(play.played_at(), Precision::Seconds);
        let whole_seconds = play.precision() == Precision::Seconds;

        let seen: bool =
            coarse_match.query_row(params![play.track(), artists, second, whole_seconds], |row| {
                row.get(0)
            })?;
        if seen {
            inserted.push(false);
            continue;
        }

        let changed = stmt.execute(params![
            play.track(),
            artists,
            play.primary_artist(),
            play.album(),
            track::format_utc(play.played_at()),
            second,
            whole_seconds,
        ])?;
        inserted.push(changed > 0);
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::parse_utc;

    fn play(name: &str, ts: &str) -> Track {
        Track::new(name, vec!["A".into(), "B".into()], "LP", parse_utc(ts).unwrap())
    }

    #[test]
    fn fresh_ledger_starts_at_zero() {
        let ledger = Ledger::open_in_memory().unwrap();
        assert_eq!(ledger.play_count().unwrap(), 0);
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn record_counts_only_new_rows() {
        let mut ledger = Ledger::open_in_memory().unwrap();
        let batch = [play("x", "2024-01-01T00:00:00Z"), play("y", "2024-01-01T00:03:00Z")];

        assert_eq!(ledger.record_plays(&batch).unwrap(), [true, true]);
        assert_eq!(ledger.record_plays(&batch).unwrap(), [false, false]);
        assert_eq!(ledger.play_count().unwrap(), 2);
        assert_eq!(ledger.track_count().unwrap(), 2);
    }

    #[test]
    fn whole_second_rows_absorb_the_same_play_with_millis() {
        let mut ledger = Ledger::open_in_memory().unwrap();
        let legacy = play("x", "2024-03-04T18:00:00Z").with_precision(Precision::Seconds);
        assert_eq!(ledger.import_plays(&[legacy]).unwrap(), 1);

        let batch = [
            play("x", "2024-03-04T18:00:00.512Z"),
            play("x", "2024-03-04T18:00:01.512Z"),
            play("y", "2024-03-04T18:00:00.512Z"),
        ];
        assert_eq!(ledger.record_plays(&batch).unwrap(), [false, true, true]);
        assert_eq!(ledger.play_count().unwrap(), 2);
        assert_eq!(ledger.track_count().unwrap(), 3);

        // precise plays sharing a second are still distinct
        assert_eq!(ledger.record_plays(&[play("y", "2024-03-04T18:00:00.700Z")]).unwrap(), [true]);

        let stored = ledger.plays().unwrap();
        assert_eq!(stored[0].precision(), Precision::Seconds);
    }

    #[test]
    fn import_leaves_counter_alone_and_seed_applies_once() {
        let mut ledger = Ledger::open_in_memory().unwrap();
        assert_eq!(ledger.import_plays(&[play("x", "2024-01-01T00:00:00Z")]).unwrap(), 1);
        assert_eq!(ledger.play_count().unwrap(), 0);

        assert!(ledger.seed_play_count(10).unwrap());
        assert!(!ledger.seed_play_count(99).unwrap());
        assert_eq!(ledger.play_count().unwrap(), 10);
    }

    #[test]
    fn plays_come_back_oldest_first_with_credits_intact() {
        let mut ledger = Ledger::open_in_memory().unwrap();
        ledger
            .record_plays(&[play("late", "2024-02-01T00:00:00Z"), play("early", "2024-01-01T00:00:00Z")])
            .unwrap();

        let plays = ledger.plays().unwrap();
        assert_eq!(plays[0].track(), "early");
        assert_eq!(plays[1].track(), "late");
        assert_eq!(plays[0].artists(), ["A", "B"]);
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        Ledger::open(&path).unwrap();

        let mut ro = Ledger::open_read_only(&path).unwrap();
        assert_eq!(ro.play_count().unwrap(), 0);
        assert!(ro.record_plays(&[play("x", "2024-01-01T00:00:00Z")]).is_err());
    }
}
