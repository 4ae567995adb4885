use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gator::commands::{self, Session};
use gator::config::Config;
use gator::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/gator/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("gator"))
}

#[derive(Parser, Debug)]
#[command(name = "gator", about = "Poll RSS feeds and store their posts")]
struct Args {
    /// Config file (default: ~/.config/gator/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Act as this user instead of current_user from the config file
    #[arg(long, value_name = "NAME", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new user
    Register { name: String },
    /// Register a feed owned by the current user
    Addfeed { name: String, url: String },
    /// Poll feeds forever at the given interval (e.g. 30s, 1m, 1h30m)
    Agg {
        interval: Option<String>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Delete all users, feeds and posts
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gator=info")),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.database_path_in(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database at {} is locked by another process.", db_path.display());
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let session = Session::new(args.user.or(config.current_user.clone()));

    match args.command {
        Command::Register { name } => {
            let user = commands::register(&db, &name).await?;
            println!("Registered user {}", user.name);
        }
        Command::Addfeed { name, url } => {
            let feed = commands::add_feed(&db, &session, &name, &url).await?;
            println!("Added feed {} ({})", feed.name, feed.url);
        }
        Command::Agg { interval, once } => {
            let interval = interval.unwrap_or(config.poll_interval);
            commands::aggregate(db, reqwest::Client::new(), &interval, once).await?;
        }
        Command::Reset => {
            commands::reset(&db).await?;
            println!("Database reset.");
        }
    }

    Ok(())
}
