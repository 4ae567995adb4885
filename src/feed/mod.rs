//! Feed retrieval and normalization.
//!
//! - [`fetcher`] - HTTP retrieval of a feed URL
//! - [`parser`] - RSS decoding into a [`FetchedDocument`], with entity unescaping
//! - [`date`] - ordered-fallback parsing of raw publication dates

mod date;
mod fetcher;
mod parser;

pub use date::{parse_pub_date, DateParseError};
pub use fetcher::{fetch_feed, FetchError, GATOR_USER_AGENT};
pub use parser::{parse_document, FeedItem, FetchedDocument};
