//! Spotify listening tracker: keeps a rolling window of recent plays, a
//! lifetime ledger in SQLite, and statistics derived from it.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod publish;
pub mod spotify;
pub mod stats;
pub mod summary;
pub mod sync;
pub mod track;

pub use error::{Result, TrackerError};
