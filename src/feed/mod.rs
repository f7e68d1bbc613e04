//! Spot and contact sources polled by the scheduler.

/// Channel-backed sources for host-driven adapters and tests.
pub mod channel;
/// Logger contact table reader.
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::spot::{ContactEvent, SpotReport};

/// Failure to obtain a batch from a source. The scheduler skips the tick and retries on the next one.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream aggregator or logger could not be reached or parsed.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The fetch did not finish within the configured timeout.
    #[error("source fetch timed out")]
    Timeout,
    /// The logger database could not be read.
    #[error("logger database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A report payload could not be decoded.
    #[error("report decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result alias for source fetches.
pub type SourceResult<T> = Result<T, SourceError>;

/// Produces batches of normalized spot reports.
///
/// Implementations perform their own I/O; the scheduler never holds cache
/// state while a fetch is in flight.
#[async_trait]
pub trait SpotSource: Send {
    /// Returns every report received since the previous call.
    async fn fetch_spots(&mut self) -> SourceResult<Vec<SpotReport>>;
}

/// Produces completed-contact events from the logger.
#[async_trait]
pub trait ContactSource: Send {
    /// Returns every contact logged since the previous call.
    async fn fetch_contacts(&mut self) -> SourceResult<Vec<ContactEvent>>;
}
