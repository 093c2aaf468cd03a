//! Read-only listening statistics over the full play history.
//!
//! Everything here is a pure function of a slice of plays (oldest first), a
//! timezone and, for streaks, the local date considered "today". Callers load
//! the plays from the [`Ledger`](crate::db::Ledger) and pick those inputs.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::track::{self, Track};

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// One row of a top-N ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked {
    pub label: String,
    pub plays: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakHour {
    pub hour: u32,
    pub plays: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListeningStats {
    pub total_plays: u64,
    pub unique_artists: usize,
    pub unique_albums: usize,
    pub unique_songs: usize,
    pub top_artists: Vec<Ranked>,
    pub top_albums: Vec<Ranked>,
    pub top_songs: Vec<Ranked>,
    pub streaks: Streaks,
    pub daily_average: f64,
    pub peak_hour: Option<PeakHour>,
    pub plays_by_hour: [u64; 24],
    pub plays_by_weekday: [u64; 7],
}

/// Counts labels in order of first appearance, then ranks them. The sort is
/// stable, so equal counts keep first-appearance order.
fn rank(labels: impl IntoIterator<Item = String>, n: usize) -> Vec<Ranked> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counted: Vec<Ranked> = Vec::new();
    for label in labels {
        match index.get(&label) {
            Some(&i) => counted[i].plays += 1,
            None => {
                index.insert(label.clone(), counted.len());
                counted.push(Ranked { label, plays: 1 });
            }
        }
    }
    counted.sort_by(|a, b| b.plays.cmp(&a.plays));
    counted.truncate(n);
    counted
}

/// Every credited artist on a play gets one play.
pub fn top_artists(plays: &[Track], n: usize) -> Vec<Ranked> {
    rank(
        plays.iter().flat_map(|t| t.artists().iter().cloned()),
        n,
    )
}

pub fn top_albums(plays: &[Track], n: usize) -> Vec<Ranked> {
    rank(plays.iter().map(|t| t.album().to_string()), n)
}

/// Songs are identified by title and primary artist.
pub fn top_songs(plays: &[Track], n: usize) -> Vec<Ranked> {
    rank(plays.iter().map(song_label), n)
}

fn song_label(t: &Track) -> String {
    match t.primary_artist() {
        "" => t.track().to_string(),
        artist => format!("{} - {}", t.track(), artist),
    }
}

pub fn unique_counts(plays: &[Track]) -> (usize, usize, usize) {
    let artists: HashSet<&str> = plays
        .iter()
        .flat_map(|t| t.artists().iter().map(String::as_str))
        .collect();
    let albums: HashSet<&str> = plays.iter().map(Track::album).collect();
    let songs: HashSet<(&str, &str)> = plays
        .iter()
        .map(|t| (t.track(), t.primary_artist()))
        .collect();
    (artists.len(), albums.len(), songs.len())
}

pub fn listening_days(plays: &[Track], tz: Tz) -> BTreeSet<NaiveDate> {
    plays
        .iter()
        .map(|t| t.local_played_at(tz).date_naive())
        .collect()
}

/// The current streak counts back from `today` if it is a listening day,
/// otherwise from yesterday; anything older means no current streak.
pub fn streaks(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Streaks {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for &day in days {
        run = match prev {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }

    let mut current = 0;
    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        current += 1;
        cursor = day.pred_opt();
    }

    Streaks { current, longest }
}

/// Plays per day over the span from the first listening day to the last,
/// both inclusive. Days without plays inside that span still count.
pub fn daily_average(plays: &[Track], tz: Tz) -> f64 {
    let days = listening_days(plays, tz);
    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        return 0.0;
    };
    let span = (*last - *first).num_days() + 1;
    plays.len() as f64 / span as f64
}

pub fn plays_by_hour(plays: &[Track], tz: Tz) -> [u64; 24] {
    let mut buckets = [0u64; 24];
    for t in plays {
        buckets[t.local_played_at(tz).hour() as usize] += 1;
    }
    buckets
}

/// Ties go to the earliest hour.
pub fn peak_hour(by_hour: &[u64; 24]) -> Option<PeakHour> {
    by_hour
        .iter()
        .enumerate()
        .filter(|&(_, &plays)| plays > 0)
        .fold(None, |best: Option<PeakHour>, (hour, &plays)| match best {
            Some(b) if b.plays >= plays => Some(b),
            _ => Some(PeakHour {
                hour: hour as u32,
                plays,
            }),
        })
}

/// Buckets follow [`WEEKDAYS`], Monday first.
pub fn plays_by_weekday(plays: &[Track], tz: Tz) -> [u64; 7] {
    let mut buckets = [0u64; 7];
    for t in plays {
        buckets[t.local_played_at(tz).weekday().num_days_from_monday() as usize] += 1;
    }
    buckets
}

/// The full report. `total_plays` is the ledger counter, which can exceed
/// the number of stored plays when it was seeded from a legacy file.
pub fn summarize(
    total_plays: u64,
    plays: &[Track],
    tz: Tz,
    today: NaiveDate,
    top_n: usize,
) -> ListeningStats {
    let (unique_artists, unique_albums, unique_songs) = unique_counts(plays);
    let by_hour = plays_by_hour(plays, tz);
    ListeningStats {
        total_plays,
        unique_artists,
        unique_albums,
        unique_songs,
        top_artists: top_artists(plays, top_n),
        top_albums: top_albums(plays, top_n),
        top_songs: top_songs(plays, top_n),
        streaks: streaks(&listening_days(plays, tz), today),
        daily_average: daily_average(plays, tz),
        peak_hour: peak_hour(&by_hour),
        plays_by_hour: by_hour,
        plays_by_weekday: plays_by_weekday(plays, tz),
    }
}

/// The current calendar date in `tz`.
pub fn local_today(tz: Tz) -> NaiveDate {
    track::to_local(Utc::now(), tz).date_naive()
}
