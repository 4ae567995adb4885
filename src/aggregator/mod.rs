//! The aggregation engine.
//!
//! Each cycle claims one feed ([`select_feed`]), fetches it
//! ([`crate::feed::fetch_feed`]) and stores its new items ([`ingest`]).
//! Cycles run one at a time, paced by a [`Ticker`]. The first failure ends
//! the run; there is no retry and no skipping ahead to the next tick.
//!
//! # Example
//!
//! ```ignore
//! let db = Database::open("gator.db").await?;
//! run_aggregation(db, reqwest::Client::new(), "1m").await?;
//! ```

mod ingest;
mod interval;
mod selector;
mod ticker;

pub use ingest::{ingest, IngestReport};
pub use interval::{parse_interval, IntervalError};
pub use selector::select_feed;
pub use ticker::{FixedTicks, IntervalTicker, Ticker};

use chrono::Utc;
use thiserror::Error;

use crate::feed::{fetch_feed, DateParseError, FetchError};
use crate::storage::{Database, DatabaseError};

/// Everything that can end an aggregation run.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The polling interval could not be parsed
    #[error("Invalid interval: {0}")]
    InvalidInterval(#[from] IntervalError),
    /// There is no feed to poll
    #[error("No feeds registered")]
    NoFeeds,
    /// Claiming the feed or storing a post failed
    #[error("Storage error: {0}")]
    Storage(#[source] DatabaseError),
    /// Network, HTTP status or XML failure for the claimed feed
    #[error("Failed to fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    /// An item carried a publication date in no known layout
    #[error(transparent)]
    Date(#[from] DateParseError),
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_id: i64,
    pub feed_name: String,
    pub created: usize,
    pub skipped: usize,
}

/// Drives polling cycles against one database.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    client: reqwest::Client,
}

impl Aggregator {
    pub fn new(db: Database, client: reqwest::Client) -> Self {
        Self { db, client }
    }

    /// Run one select → fetch → ingest cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, AggregateError> {
        let feed = select_feed(&self.db, Utc::now()).await?;
        tracing::info!(feed_id = feed.id, name = %feed.name, url = %feed.url, "Scraping feed");

        let document = fetch_feed(&self.client, &feed.url)
            .await
            .map_err(|source| AggregateError::Fetch {
                url: feed.url.clone(),
                source,
            })?;

        let IngestReport { created, skipped } =
            ingest(&self.db, &feed, &document, Utc::now()).await?;
        tracing::info!(
            feed_id = feed.id,
            title = %document.title,
            created = created,
            skipped = skipped,
            "Feed scraped"
        );

        Ok(CycleReport {
            feed_id: feed.id,
            feed_name: feed.name,
            created,
            skipped,
        })
    }

    /// Run a cycle on every tick until the ticker is exhausted or a cycle
    /// fails.
    pub async fn run<T: Ticker>(&self, ticker: &mut T) -> Result<(), AggregateError> {
        while ticker.tick().await {
            self.run_cycle().await?;
        }
        Ok(())
    }
}

/// Poll feeds every `interval` (e.g. `"1m"`) until a cycle fails.
///
/// The first cycle starts immediately. A malformed interval is reported
/// before any cycle runs. This only returns with an error.
pub async fn run_aggregation(
    db: Database,
    client: reqwest::Client,
    interval: &str,
) -> Result<(), AggregateError> {
    let period = parse_interval(interval)?;
    tracing::info!(interval = %interval, "Collecting feeds every {}", interval);

    let mut ticker = IntervalTicker::new(period);
    Aggregator::new(db, client).run(&mut ticker).await
}
