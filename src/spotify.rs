//! Fetching recent plays from the Spotify Web API.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SpotifySettings;
use crate::error::{Result, TrackerError};
use crate::track::{self, Track};

/// Anything that can report the listener's most recent plays.
pub trait PlaySource {
    fn recently_played(&self, limit: usize) -> Result<FetchedBatch>;
}

/// A page of plays as fetched, in whatever order the source returned them.
#[derive(Debug, Default)]
pub struct FetchedBatch {
    pub plays: Vec<Track>,
    /// Items dropped because they were missing fields or had a bad timestamp.
    pub skipped: usize,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct RecentlyPlayedPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct PlayHistoryItem {
    track: TrackObject,
    played_at: String,
}

#[derive(Deserialize)]
struct TrackObject {
    name: String,
    artists: Vec<NamedObject>,
    album: NamedObject,
}

#[derive(Deserialize)]
struct NamedObject {
    name: String,
}

pub struct SpotifyClient {
    http: Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    api_base: String,
    accounts_base: String,
}

impl SpotifyClient {
    pub fn from_settings(settings: &SpotifySettings) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| TrackerError::Auth(format!("spotify.{name} is not configured")))
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| TrackerError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            client_id: required(&settings.client_id, "client_id")?,
            client_secret: required(&settings.client_secret, "client_secret")?,
            refresh_token: required(&settings.refresh_token, "refresh_token")?,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            accounts_base: settings.accounts_base.trim_end_matches('/').to_string(),
        })
    }

    /// Trade the refresh token for a short-lived access token.
    fn access_token(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .map_err(transport_error)?;

        let resp = check_status(resp, true)?;
        let token: TokenResponse = resp
            .json()
            .map_err(|e| TrackerError::Api(format!("token response: {e}")))?;
        debug!("Obtained Spotify access token");
        Ok(token.access_token)
    }
}

impl PlaySource for SpotifyClient {
    fn recently_played(&self, limit: usize) -> Result<FetchedBatch> {
        let token = self.access_token()?;
        let resp = self
            .http
            .get(format!("{}/me/player/recently-played", self.api_base))
            .bearer_auth(token)
            .query(&[("limit", limit)])
            .send()
            .map_err(transport_error)?;

        let body = check_status(resp, false)?
            .text()
            .map_err(transport_error)?;
        let batch = parse_page(&body)?;
        info!(
            fetched = batch.plays.len(),
            skipped = batch.skipped,
            "Fetched recently played tracks"
        );
        Ok(batch)
    }
}

fn transport_error(err: reqwest::Error) -> TrackerError {
    TrackerError::Network(err.to_string())
}

fn check_status(resp: Response, token_endpoint: bool) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(status_error(status, &body, token_endpoint))
}

/// 401/403 (and a 400 from the token endpoint, which is how a revoked refresh
/// token is reported) are credential problems. 429 and 5xx are worth another
/// try on the next run. Anything else is unexpected.
fn status_error(status: StatusCode, body: &str, token_endpoint: bool) -> TrackerError {
    let detail = format!("HTTP {status}: {}", body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TrackerError::Auth(detail),
        StatusCode::BAD_REQUEST if token_endpoint => TrackerError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => TrackerError::Network(detail),
        s if s.is_server_error() => TrackerError::Network(detail),
        _ => TrackerError::Api(detail),
    }
}

/// Decode a recently-played page. Items that do not decode are logged and
/// skipped; a body that is not a page at all is an error.
pub fn parse_page(body: &str) -> Result<FetchedBatch> {
    let page: RecentlyPlayedPage = serde_json::from_str(body)
        .map_err(|e| TrackerError::Api(format!("recently played response: {e}")))?;

    let mut batch = FetchedBatch::default();
    for (index, raw) in page.items.into_iter().enumerate() {
        let item: PlayHistoryItem = match serde_json::from_value(raw) {
            Ok(item) => item,
            Err(err) => {
                warn!(index, %err, "Skipping malformed play");
                batch.skipped += 1;
                continue;
            }
        };
        let Some(played_at) = track::parse_utc(&item.played_at) else {
            warn!(index, played_at = %item.played_at, "Skipping play with bad timestamp");
            batch.skipped += 1;
            continue;
        };
        batch.plays.push(Track::new(
            item.track.name,
            item.track.artists.into_iter().map(|a| a.name).collect(),
            item.track.album.name,
            played_at,
        ));
    }
    Ok(batch)
}
