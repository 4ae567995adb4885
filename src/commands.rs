//! Handlers behind the command-line surface.
//!
//! Each handler receives what it needs explicitly: the database, and for
//! commands acting on behalf of someone, a [`Session`].
use anyhow::{bail, Context, Result};
use url::Url;

use crate::aggregator::{self, Aggregator, FixedTicks};
use crate::storage::{Database, DatabaseError, Feed, User};

/// Identity of the caller, resolved once at startup from `--user` or the
/// config file.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<String>,
}

impl Session {
    pub fn new(user: Option<String>) -> Self {
        Self { user }
    }

    /// Look up the session user, failing if none is set or it is unknown.
    pub async fn require_user(&self, db: &Database) -> Result<User> {
        let Some(name) = self.user.as_deref() else {
            bail!("No user set: pass --user or set current_user in the config file");
        };
        match db.get_user_by_name(name).await {
            Ok(user) => Ok(user),
            Err(DatabaseError::NotFound) => bail!("User {name} does not exist, please register"),
            Err(e) => Err(e).context("Failed to look up user"),
        }
    }
}

pub async fn register(db: &Database, name: &str) -> Result<User> {
    let name = name.trim();
    if name.is_empty() {
        bail!("User name must not be empty");
    }
    match db.create_user(name).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, name = %user.name, "User registered");
            Ok(user)
        }
        Err(e) if e.is_unique_violation() => bail!("User {name} already exists"),
        Err(e) => Err(e).context("Failed to register user"),
    }
}

/// Register a feed owned by the session user.
pub async fn add_feed(db: &Database, session: &Session, name: &str, url: &str) -> Result<Feed> {
    let user = session.require_user(db).await?;
    let url = Url::parse(url).with_context(|| format!("Invalid feed URL: {url}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Unsupported scheme {} (only http/https allowed)", url.scheme());
    }

    match db.create_feed(name, url.as_str(), user.id).await {
        Ok(feed) => {
            tracing::info!(feed_id = feed.id, name = %feed.name, url = %feed.url, "Feed added");
            Ok(feed)
        }
        Err(e) if e.is_unique_violation() => bail!("Feed {url} is already registered"),
        Err(e) => Err(e).context("Failed to add feed"),
    }
}

/// Run the aggregation loop, or a single cycle when `once` is set.
pub async fn aggregate(
    db: Database,
    client: reqwest::Client,
    interval: &str,
    once: bool,
) -> Result<()> {
    if once {
        Aggregator::new(db, client)
            .run(&mut FixedTicks::new(1))
            .await
            .context("Aggregation cycle failed")?;
        return Ok(());
    }
    aggregator::run_aggregation(db, client, interval)
        .await
        .context("Aggregation stopped")
}

pub async fn reset(db: &Database) -> Result<()> {
    db.reset().await.context("Failed to reset database")?;
    Ok(())
}
