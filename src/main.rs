use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shrink::analytics::{AnalyticsService, ClickContext};
use shrink::cache::MemoryCache;
use shrink::codec;
use shrink::config::{Config, DatabaseBackend, RecorderMode};
use shrink::recorder::{DetachedSink, QueuedSink, RecordingSink};
use shrink::service::LinkService;
use shrink::storage::{AnalyticsStore, LinkStore, PostgresStorage, SqliteStorage};

#[derive(Parser)]
#[command(name = "shrink")]
#[command(about = "Shrink link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a URL
    Shorten {
        url: String,
        /// Owner to record on the link
        #[arg(long)]
        owner: Option<u64>,
    },
    /// Resolve a short code to its destination (records a click)
    Resolve { code: String },
    /// Delete a link and its click history
    Delete {
        code: String,
        #[arg(long)]
        owner: u64,
    },
    /// List an owner's links, newest first
    List {
        #[arg(long)]
        owner: u64,
        #[arg(long, default_value_t = 20)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Show total links and recorded clicks
    Stats,
    /// Show the click summary for a link
    Analytics {
        code: String,
        #[arg(long)]
        owner: u64,
        /// Lookback such as 7d or 24h (defaults to ANALYTICS_DEFAULT_PERIOD)
        #[arg(long)]
        period: Option<String>,
    },
    /// Encode a numeric id as a short code
    Encode { id: u64 },
    /// Decode a short code back to its numeric id
    Decode { code: String },
}

async fn connect(config: &Config) -> Result<(Arc<dyn LinkStore>, Arc<dyn AnalyticsStore>)> {
    let db = &config.database;
    match db.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", db.url);
            let storage = SqliteStorage::new(&db.url, db.max_connections)
                .await
                .context("failed to connect to SQLite")?
                .with_id_floor(db.id_floor);
            storage.init().await?;
            let storage = Arc::new(storage);
            let links: Arc<dyn LinkStore> = storage.clone();
            let events: Arc<dyn AnalyticsStore> = storage;
            Ok((links, events))
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", db.url);
            let storage = PostgresStorage::new(&db.url, db.max_connections)
                .await
                .context("failed to connect to PostgreSQL")?
                .with_id_floor(db.id_floor);
            storage.init().await?;
            let storage = Arc::new(storage);
            let links: Arc<dyn LinkStore> = storage.clone();
            let events: Arc<dyn AnalyticsStore> = storage;
            Ok((links, events))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Pure codec commands need no database
    match &cli.command {
        Commands::Encode { id } => {
            println!("{}", codec::encode(*id));
            return Ok(());
        }
        Commands::Decode { code } => {
            println!("{}", codec::decode(code)?);
            return Ok(());
        }
        _ => {}
    }

    let config = Config::from_env()?;
    let (links, events) = connect(&config).await?;

    let analytics = Arc::new(AnalyticsService::with_anonymizer(
        events,
        config.analytics.anonymizer(),
    ));
    let cache = Arc::new(MemoryCache::new(config.cache.max_entries));

    let queue = match config.recorder.mode {
        RecorderMode::Queued => Some(Arc::new(QueuedSink::new(
            config.recorder.workers,
            config.recorder.queue_capacity,
            config.recorder.overflow,
        ))),
        RecorderMode::Detached => None,
    };
    let sink: Arc<dyn RecordingSink> = match &queue {
        Some(queue) => queue.clone(),
        None => Arc::new(DetachedSink),
    };

    let service = LinkService::new(links, cache, analytics, sink)
        .with_config(config.cache.link_service_config());

    let result = run(&service, &config, cli.command).await;

    if let Some(queue) = queue {
        queue.shutdown().await;
    }

    result
}

async fn run(service: &LinkService, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Shorten { url, owner } => {
            let code = service.shorten(&url, owner).await?;
            println!("{code}");
        }
        Commands::Resolve { code } => {
            let client = ClickContext::new(
                "127.0.0.1",
                concat!("shrink-cli/", env!("CARGO_PKG_VERSION")),
            );
            let url = service.redirect(&code, client).await?;
            println!("{url}");
        }
        Commands::Delete { code, owner } => {
            service.delete_link(&code, owner).await?;
            println!("✓ Deleted '{code}'");
        }
        Commands::List {
            owner,
            limit,
            offset,
        } => {
            let page = service.get_user_links(owner, limit, offset).await?;
            if page.links.is_empty() {
                println!("No links found for owner {owner}.");
            } else {
                println!("{:<12} {:<12} {}", "Code", "Created", "URL");
                println!("{}", "-".repeat(80));
                for link in &page.links {
                    println!("{:<12} {:<12} {}", link.short_code, link.created_at, link.long_url);
                }
                println!("Showing {} of {} links", page.links.len(), page.total);
            }
        }
        Commands::Stats => {
            let stats = service.get_global_stats().await?;
            println!("Total links:    {}", stats.total_links);
            println!("Total requests: {}", stats.total_requests);
        }
        Commands::Analytics {
            code,
            owner,
            period,
        } => {
            let period = period.unwrap_or_else(|| config.analytics.default_period.clone());
            let summary = service.link_analytics(&code, owner, &period).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Encode { .. } | Commands::Decode { .. } => {}
    }

    Ok(())
}
