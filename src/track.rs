//! The play record shared by every store, plus the timestamp helpers that
//! every conversion between UTC and the listener's zone goes through.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use chrono_tz::Tz;

/// Timestamp layout used by history files written before the ISO-8601 switch.
/// Those values are wall-clock times in the configured zone.
pub const LEGACY_PLAYED_AT_FORMAT: &str = "%d/%m/%Y - %H:%M:%S";

/// How finely a play's timestamp was recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Precision {
    /// Millisecond timestamps, as the recently-played API reports them.
    #[default]
    Millis,
    /// Whole seconds only. Legacy history entries are stored this way.
    Seconds,
}

/// One play of one track. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    track: String,
    artists: Vec<String>,
    album: String,
    played_at: DateTime<Utc>,
    precision: Precision,
}

impl Track {
    /// `played_at` is truncated to millisecond precision, the resolution both
    /// the history file and the ledger store.
    pub fn new(
        track: impl Into<String>,
        artists: Vec<String>,
        album: impl Into<String>,
        played_at: DateTime<Utc>,
    ) -> Self {
        Self {
            track: track.into(),
            artists,
            album: album.into(),
            played_at: played_at.trunc_subsecs(3),
            precision: Precision::Millis,
        }
    }

    /// Mark the timestamp as recorded at `precision`, truncating it to match.
    pub fn with_precision(mut self, precision: Precision) -> Self {
        if precision == Precision::Seconds {
            self.played_at = self.played_at.trunc_subsecs(0);
        }
        self.precision = precision;
        self
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn artists(&self) -> &[String] {
        &self.artists
    }

    /// First credited artist, or an empty string for uncredited plays.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn played_at(&self) -> DateTime<Utc> {
        self.played_at
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Whether both records describe the same play: same title, same credits
    /// and same instant. When either side only has whole seconds, the instants
    /// are compared to the second.
    pub fn same_play(&self, other: &Track) -> bool {
        self.track == other.track
            && self.artists == other.artists
            && match (self.precision, other.precision) {
                (Precision::Millis, Precision::Millis) => self.played_at == other.played_at,
                _ => self.played_at.trunc_subsecs(0) == other.played_at.trunc_subsecs(0),
            }
    }

    pub fn local_played_at(&self, tz: Tz) -> DateTime<Tz> {
        to_local(self.played_at, tz)
    }
}

/// The single UTC → local conversion used by statistics and rendering.
pub fn to_local(ts: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    ts.with_timezone(&tz)
}

/// Canonical text form: RFC 3339, millisecond precision, `Z` suffix.
/// Lexicographic order of these strings matches chronological order.
pub fn format_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a legacy local timestamp. Times repeated by a DST fall-back resolve
/// to the earlier instant; times skipped by a spring-forward are rejected.
pub fn parse_legacy_local(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LEGACY_PLAYED_AT_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Text form for a timestamp recorded at `precision`. Whole-second values
/// carry no fractional part, so the precision survives a round trip through
/// [`parse_played_at`].
pub fn format_played_at(ts: DateTime<Utc>, precision: Precision) -> String {
    match precision {
        Precision::Millis => format_utc(ts),
        Precision::Seconds => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Accept either timestamp layout found in history files. ISO values without
/// a fractional part and legacy local values are whole-second precision.
pub fn parse_played_at(raw: &str, tz: Tz) -> Option<(DateTime<Utc>, Precision)> {
    if let Some(ts) = parse_utc(raw) {
        let precision = if raw.contains('.') {
            Precision::Millis
        } else {
            Precision::Seconds
        };
        return Some((ts, precision));
    }
    parse_legacy_local(raw, tz).map(|ts| (ts, Precision::Seconds))
}
