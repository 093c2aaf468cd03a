use super::load::default_config_path;
use super::schema::*;
use crate::error::TrackerError;
use std::io::Write;
use std::path::PathBuf;

// A prefix nothing in the test environment sets.
const NO_ENV: &str = "PLAYLOG_TEST_UNSET";

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_match_documented_values() {
    let s = Settings::default();
    assert_eq!(s.history.max_size, 200);
    assert_eq!(s.history.path, PathBuf::from("spotify_data.json"));
    assert_eq!(s.ledger.path, PathBuf::from("play_counter.db"));
    assert_eq!(s.spotify.fetch_limit, 50);
    assert_eq!(s.summary.top_n, 5);
    assert!(s.publish.enabled);
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
timezone = "Europe/Berlin"

[history]
max_size = 25

[spotify]
client_id = "abc"
fetch_limit = 20

[publish]
enabled = false
"#,
    );

    let s = Settings::load_from(Some(file.path()), true, NO_ENV).unwrap();
    assert_eq!(s.timezone.as_deref(), Some("Europe/Berlin"));
    assert_eq!(s.history.max_size, 25);
    assert_eq!(s.history.path, PathBuf::from("spotify_data.json"));
    assert_eq!(s.spotify.client_id.as_deref(), Some("abc"));
    assert_eq!(s.spotify.fetch_limit, 20);
    assert!(!s.publish.enabled);
    s.validate().unwrap();
    assert_eq!(s.zone().unwrap(), chrono_tz::Europe::Berlin);
}

#[test]
fn missing_optional_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let s = Settings::load_from(Some(&dir.path().join("absent.toml")), false, NO_ENV).unwrap();
    assert_eq!(s.history.max_size, 200);
}

#[test]
fn missing_required_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Settings::load_from(Some(&dir.path().join("absent.toml")), true, NO_ENV).is_err());
}

#[test]
fn timezone_must_be_present_and_known() {
    let mut s = Settings::default();
    assert!(matches!(s.validate(), Err(TrackerError::Config(_))));

    s.timezone = Some("  ".into());
    assert!(matches!(s.zone(), Err(TrackerError::Config(_))));

    s.timezone = Some("Mars/Olympus_Mons".into());
    assert!(matches!(s.zone(), Err(TrackerError::Timezone(_))));

    s.timezone = Some("America/Sao_Paulo".into());
    assert!(s.validate().is_ok());
}

#[test]
fn validate_rejects_unusable_sizes() {
    let mut s = Settings {
        timezone: Some("UTC".into()),
        ..Settings::default()
    };
    s.history.max_size = 0;
    assert!(s.validate().is_err());

    s.history.max_size = 10;
    s.spotify.fetch_limit = 51;
    assert!(s.validate().is_err());

    s.spotify.fetch_limit = 50;
    s.summary.top_n = 0;
    assert!(s.validate().is_err());
}

#[test]
fn default_config_path_ends_with_config_toml() {
    if let Some(path) = default_config_path() {
        assert!(path.ends_with("config.toml"));
    }
}
