//! The rolling window of recent plays, persisted as a JSON file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::track::{self, Track};

pub const DEFAULT_MAX_HISTORY: usize = 200;

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    total_plays: u64,
    #[serde(default)]
    tracks: Vec<StoredTrack>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTrack {
    #[serde(alias = "song_name")]
    track: String,
    #[serde(default)]
    artists: Vec<String>,
    #[serde(default)]
    album: String,
    played_at: String,
}

impl From<&Track> for StoredTrack {
    fn from(t: &Track) -> Self {
        Self {
            track: t.track().to_string(),
            artists: t.artists().to_vec(),
            album: t.album().to_string(),
            played_at: track::format_played_at(t.played_at(), t.precision()),
        }
    }
}

/// Size-capped, oldest-first list of recent plays.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    entries: Vec<Track>,
    capacity: usize,
}

/// What was found on disk alongside the entries themselves.
#[derive(Debug)]
pub struct LoadedHistory {
    pub history: BoundedHistory,
    /// `total_plays` as recorded in the file (0 when absent).
    pub recorded_total: u64,
    /// Entries dropped because their timestamp could not be read.
    pub skipped: usize,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Build from tracks already in chronological order, keeping the newest
    /// `capacity` of them.
    pub fn from_tracks(capacity: usize, tracks: Vec<Track>) -> Self {
        let mut history = Self {
            entries: tracks,
            capacity: capacity.max(1),
        };
        history.enforce_cap();
        history
    }

    /// Read the history file. A missing file is an empty history; a file that
    /// exists but is not valid JSON is an error.
    pub fn load(path: &Path, capacity: usize, tz: Tz) -> Result<LoadedHistory> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No history file at {}, starting empty", path.display());
                return Ok(LoadedHistory {
                    history: Self::new(capacity),
                    recorded_total: 0,
                    skipped: 0,
                });
            }
            Err(err) => return Err(TrackerError::io(path, err)),
        };

        let file: HistoryFile =
            serde_json::from_str(&raw).map_err(|source| TrackerError::HistoryFormat {
                path: path.to_path_buf(),
                source,
            })?;

        let mut skipped = 0;
        let mut tracks = Vec::with_capacity(file.tracks.len());
        for stored in file.tracks {
            match track::parse_played_at(&stored.played_at, tz) {
                Some((played_at, precision)) => tracks.push(
                    Track::new(stored.track, stored.artists, stored.album, played_at)
                        .with_precision(precision),
                ),
                None => {
                    warn!(
                        track = %stored.track,
                        played_at = %stored.played_at,
                        "Skipping history entry with unreadable timestamp"
                    );
                    skipped += 1;
                }
            }
        }

        let history = Self::from_tracks(capacity, tracks);
        debug!(entries = history.len(), "Loaded history from {}", path.display());
        Ok(LoadedHistory {
            history,
            recorded_total: file.total_plays,
            skipped,
        })
    }

    pub fn entries(&self) -> &[Track] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Track> {
        self.entries.last()
    }

    pub fn contains(&self, track: &Track) -> bool {
        self.entries.iter().any(|t| t.same_play(track))
    }

    /// Place `track` after every entry played at or before it. Existing
    /// entries keep their relative order.
    pub fn insert_chronological(&mut self, track: Track) {
        let at = track.played_at();
        let pos = self.entries.partition_point(|t| t.played_at() <= at);
        self.entries.insert(pos, track);
    }

    /// Drop the oldest entries until the cap holds; returns what was dropped.
    pub fn enforce_cap(&mut self) -> Vec<Track> {
        let excess = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..excess).collect()
    }

    pub fn to_json(&self, total_plays: u64) -> Result<String> {
        let file = HistoryFile {
            total_plays,
            tracks: self.entries.iter().map(StoredTrack::from).collect(),
        };
        serde_json::to_string_pretty(&file).map_err(|source| TrackerError::HistoryFormat {
            path: Default::default(),
            source,
        })
    }

    pub fn save(&self, path: &Path, total_plays: u64) -> Result<()> {
        let json = self.to_json(total_plays)?;
        write_atomic(path, json.as_bytes())
    }
}

/// `tracks` in the history file's entry layout. Used to log plays that could
/// not be persisted.
pub(crate) fn tracks_json(tracks: &[Track]) -> Result<String> {
    let stored: Vec<StoredTrack> = tracks.iter().map(StoredTrack::from).collect();
    serde_json::to_string(&stored).map_err(|source| TrackerError::HistoryFormat {
        path: Default::default(),
        source,
    })
}

/// Write through a temp file in the destination directory and rename it into
/// place, so readers never see a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| TrackerError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| TrackerError::io(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| TrackerError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| TrackerError::io(path, e.error))?;
    Ok(())
}
