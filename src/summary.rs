//! Markdown summary published next to the history file, plus the plain-text
//! reports printed by the CLI.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::history::write_atomic;
use crate::stats::{ListeningStats, Ranked, Streaks, WEEKDAYS};

/// Group digits in thousands: 12345 -> "12,345".
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn ranked_lines(rows: &[Ranked]) -> String {
    if rows.is_empty() {
        return "No data yet\n".to_string();
    }
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({} plays)", i + 1, row.label, row.plays);
    }
    out
}

pub fn render_markdown(stats: &ListeningStats) -> String {
    let peak = stats
        .peak_hour
        .map(|p| format!("{:02}:00", p.hour))
        .unwrap_or_else(|| "n/a".to_string());

    let mut out = String::new();
    let _ = write!(
        out,
        "# Listening History\n\n\
         Tracking my Spotify listening history.\n\n\
         ## Lifetime Stats\n\n\
         **{total}** songs listened to\n\n\
         - **{artists}** unique artists\n\
         - **{albums}** unique albums\n\
         - **{songs}** unique songs\n\
         - **{avg:.1}** songs per day (average)\n\n\
         ## Top Artists (All Time)\n\n\
         {top}\n\
         ## Listening Streak\n\n\
         - Current: **{current}** days\n\
         - Longest: **{longest}** days\n\n\
         ## Listening Patterns\n\n\
         - Peak hour: **{peak}**\n",
        total = thousands(stats.total_plays),
        artists = stats.unique_artists,
        albums = stats.unique_albums,
        songs = stats.unique_songs,
        avg = stats.daily_average,
        top = ranked_lines(&stats.top_artists),
        current = stats.streaks.current,
        longest = stats.streaks.longest,
    );
    for (day, plays) in WEEKDAYS.iter().zip(stats.plays_by_weekday) {
        let _ = writeln!(out, "- {day}: {plays} plays");
    }
    out.push_str("\n---\n*Automatically updated by playlog*\n");
    out
}

pub fn write_markdown(path: &Path, stats: &ListeningStats) -> Result<()> {
    write_atomic(path, render_markdown(stats).as_bytes())
}

pub fn render_report(stats: &ListeningStats) -> String {
    let rule = "=".repeat(50);
    let mut out = String::new();
    let _ = writeln!(out, "\n{rule}\nLISTENING STATISTICS\n{rule}");
    let _ = writeln!(out, "\nLifetime Stats");
    let _ = writeln!(out, "   Total plays: {}", thousands(stats.total_plays));
    let _ = writeln!(out, "   Unique artists: {}", stats.unique_artists);
    let _ = writeln!(out, "   Unique albums: {}", stats.unique_albums);
    let _ = writeln!(out, "   Unique songs: {}", stats.unique_songs);
    let _ = writeln!(out, "   Daily average: {:.1}", stats.daily_average);

    out.push_str(&render_streak(&stats.streaks));

    for (title, rows) in [
        ("Top Artists", &stats.top_artists),
        ("Top Albums", &stats.top_albums),
        ("Top Songs", &stats.top_songs),
    ] {
        let _ = writeln!(out, "\n{title}");
        for (i, row) in rows.iter().enumerate() {
            let _ = writeln!(out, "   {}. {} ({} plays)", i + 1, row.label, row.plays);
        }
    }

    if let Some(peak) = stats.peak_hour {
        let _ = writeln!(
            out,
            "\nPeak Listening Hour: {:02}:00 ({} plays)",
            peak.hour, peak.plays
        );
    }

    let _ = writeln!(out, "\nPlays by Weekday");
    for (day, plays) in WEEKDAYS.iter().zip(stats.plays_by_weekday) {
        let _ = writeln!(out, "   {day}: {plays}");
    }
    let _ = writeln!(out, "\n{rule}");
    out
}

pub fn render_top(title: &str, rows: &[Ranked]) -> String {
    let mut out = format!("\n{title}\n{}\n", "-".repeat(40));
    if rows.is_empty() {
        out.push_str("No data yet\n");
    }
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(out, "{:2}. {} ({} plays)", i + 1, row.label, row.plays);
    }
    out
}

pub fn render_streak(streaks: &Streaks) -> String {
    format!(
        "\nListening Streak\n   Current: {} days\n   Longest: {} days\n",
        streaks.current, streaks.longest
    )
}
