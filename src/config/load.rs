use std::env;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use directories::ProjectDirs;
use tracing::debug;

use super::schema::Settings;
use crate::error::{Result, TrackerError};

pub(crate) const ENV_PREFIX: &str = "PLAYLOG";
const CONFIG_PATH_VAR: &str = "PLAYLOG_CONFIG_PATH";
const MAX_FETCH_LIMIT: usize = 50;

/// Configuration loading helpers.
impl Settings {
    /// Load settings. An explicit path must exist; otherwise the resolved
    /// default path is read if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(Some(path), true, ENV_PREFIX),
            None => Self::load_from(resolve_config_path().as_deref(), false, ENV_PREFIX),
        }
    }

    pub(crate) fn load_from(path: Option<&Path>, required: bool, env_prefix: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!("Reading configuration from {}", path.display());
            builder = builder.add_source(::config::File::from(path).required(required));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Reject settings no run could succeed with. Spotify credentials are
    /// checked later, only by commands that talk to the API.
    pub fn validate(&self) -> Result<()> {
        self.zone()?;
        if self.history.max_size == 0 {
            return Err(TrackerError::Config("history.max_size must be >= 1".into()));
        }
        if !(1..=MAX_FETCH_LIMIT).contains(&self.spotify.fetch_limit) {
            return Err(TrackerError::Config(format!(
                "spotify.fetch_limit must be between 1 and {MAX_FETCH_LIMIT}"
            )));
        }
        if self.summary.top_n == 0 {
            return Err(TrackerError::Config("summary.top_n must be >= 1".into()));
        }
        Ok(())
    }

    /// The configured zone. There is no fallback: streaks and hourly buckets
    /// would silently shift under a guessed zone.
    pub fn zone(&self) -> Result<Tz> {
        let name = self
            .timezone
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TrackerError::Config("timezone is not set".into()))?;
        name.parse::<Tz>()
            .map_err(|_| TrackerError::Timezone(name.to_string()))
    }
}

/// Resolve the config path from `PLAYLOG_CONFIG_PATH` or the platform default.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `config.toml` inside the platform config directory for `playlog`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "playlog").map(|dirs| dirs.config_dir().join("config.toml"))
}
