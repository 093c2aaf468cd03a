use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;
use crate::db::Ledger;
use crate::error::{Result, TrackerError};
use crate::migrate::migrate_history;
use crate::publish;
use crate::spotify::SpotifyClient;
use crate::stats;
use crate::summary;
use crate::sync::run_sync;
use crate::track::Track;

#[derive(Parser, Debug)]
#[command(
    name = "playlog",
    version,
    about = "Track Spotify listening history with lifetime statistics"
)]
pub struct Cli {
    /// Read settings from this TOML file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch recent plays, update history and ledger, publish (default)
    Sync,
    /// Show comprehensive listening statistics
    Stats,
    /// Show the most played artists
    TopArtists {
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// Show the most played albums
    TopAlbums {
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// Show the most played songs
    TopSongs {
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// Show current and longest listening streaks
    Streak,
    /// Import the history file into the ledger without syncing
    Migrate,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    settings.validate()?;
    let tz = settings.zone()?;

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let source = SpotifyClient::from_settings(&settings.spotify)?;
            let publisher = publish::from_settings(&settings.publish);
            run_sync(&settings, &source, publisher.as_ref(), stats::local_today(tz))?;
        }
        Commands::Stats => {
            let ledger = open_for_reading(&settings)?;
            let plays = ledger.plays()?;
            let listening = stats::summarize(
                ledger.play_count()?,
                &plays,
                tz,
                stats::local_today(tz),
                settings.summary.top_n,
            );
            print!("{}", summary::render_report(&listening));
        }
        Commands::TopArtists { n } => {
            let plays = read_plays(&settings)?;
            let title = format!("Top {n} Artists");
            print!("{}", summary::render_top(&title, &stats::top_artists(&plays, n)));
        }
        Commands::TopAlbums { n } => {
            let plays = read_plays(&settings)?;
            let title = format!("Top {n} Albums");
            print!("{}", summary::render_top(&title, &stats::top_albums(&plays, n)));
        }
        Commands::TopSongs { n } => {
            let plays = read_plays(&settings)?;
            let title = format!("Top {n} Songs");
            print!("{}", summary::render_top(&title, &stats::top_songs(&plays, n)));
        }
        Commands::Streak => {
            let plays = read_plays(&settings)?;
            let days = stats::listening_days(&plays, tz);
            print!("{}", summary::render_streak(&stats::streaks(&days, stats::local_today(tz))));
        }
        Commands::Migrate => {
            let mut ledger = Ledger::open(&settings.ledger.path)?;
            let report = migrate_history(&mut ledger, &settings.history.path, tz)?;
            println!("Migrated {} tracks to database", report.imported);
            if report.skipped > 0 {
                println!("Skipped {} unreadable entries", report.skipped);
            }
        }
    }

    Ok(())
}

/// Reporting never creates or alters the ledger.
fn open_for_reading(settings: &Settings) -> Result<Ledger> {
    let path = &settings.ledger.path;
    if !path.exists() {
        return Err(TrackerError::Config(format!(
            "no ledger at {}; run a sync or migrate first",
            path.display()
        )));
    }
    Ledger::open_read_only(path)
}

fn read_plays(settings: &Settings) -> Result<Vec<Track>> {
    open_for_reading(settings)?.plays()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_sync() {
        let cli = Cli::try_parse_from(["playlog"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["playlog", "top-artists", "3", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::TopArtists { n: 3 })));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));

        let cli = Cli::try_parse_from(["playlog", "top-songs"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::TopSongs { n: 10 })));
    }

    #[test]
    fn reporting_without_a_ledger_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.ledger.path = dir.path().join("missing.db");
        assert!(matches!(read_plays(&settings), Err(TrackerError::Config(_))));
        assert!(!settings.ledger.path.exists());
    }
}
