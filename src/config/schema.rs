use std::path::PathBuf;

use serde::Deserialize;

use crate::history::DEFAULT_MAX_HISTORY;

/// Top-level settings, built once at startup and handed to each component.
///
/// File format: TOML
/// Default path: the platform config dir, e.g. `~/.config/playlog/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `PLAYLOG__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IANA zone name used for every local-time calculation. Required.
    pub timezone: Option<String>,
    pub history: HistorySettings,
    pub ledger: LedgerSettings,
    pub spotify: SpotifySettings,
    pub summary: SummarySettings,
    pub publish: PublishSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: None,
            history: HistorySettings::default(),
            ledger: LedgerSettings::default(),
            spotify: SpotifySettings::default(),
            summary: SummarySettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// JSON file holding the recent-plays window.
    pub path: PathBuf,
    /// Maximum number of plays kept in the window.
    pub max_size: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("spotify_data.json"),
            max_size: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// SQLite database with the play counter and the full history.
    pub path: PathBuf,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("play_counter.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Long-lived refresh token from a one-off authorization done elsewhere.
    pub refresh_token: Option<String>,
    /// Plays requested per sync. The API caps this at 50.
    pub fetch_limit: usize,
    pub api_base: String,
    pub accounts_base: String,
    pub timeout_secs: u64,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            fetch_limit: 50,
            api_base: "https://api.spotify.com/v1".to_string(),
            accounts_base: "https://accounts.spotify.com".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// Markdown file regenerated after each sync that found new plays.
    pub path: PathBuf,
    /// Length of the rankings shown in the summary and `stats` output.
    pub top_n: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("README.md"),
            top_n: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub enabled: bool,
    /// Working tree the history and summary files live in.
    pub repo_dir: PathBuf,
    pub remote: String,
    pub commit_message: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            commit_message: "Update listening history".to_string(),
        }
    }
}
