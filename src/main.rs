use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use newsroom::config::Config;
use newsroom::feed::{build_client, FeedFetcher, FeedRegistry};
use newsroom::ingest::{BatchSummary, FeedImportResult, ImportPipeline, PipelineOptions};
use newsroom::scheduler::RunCoordinator;
use newsroom::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(name = "newsroom", about = "Imports local news feeds as draft posts")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "FILE", default_value = "newsroom.toml")]
    config: PathBuf,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the recurring import until interrupted
    Serve,
    /// Import all enabled feeds once, or a single feed by name
    Import {
        #[arg(long, value_name = "NAME")]
        feed: Option<String>,
    },
    /// Import an arbitrary feed URL once
    ImportUrl {
        url: String,
        /// Source name recorded on the imported posts
        #[arg(long)]
        name: String,
        #[arg(long)]
        max_items: Option<usize>,
    },
    /// List configured feeds
    Feeds,
    /// Show imported post counts per feed
    Counts,
    /// Delete every post imported from a feed
    Clear { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let registry = FeedRegistry::new(config.feeds.clone()).context("Invalid feed list")?;

    let db_path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: database {} is locked by another process.",
                db_path
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
    let fetcher = FeedFetcher::new(client).with_timeout(config.fetch_timeout());
    let pipeline = Arc::new(ImportPipeline::new(
        Arc::new(registry),
        Arc::new(db),
        fetcher,
        PipelineOptions::from(&config),
    ));

    match args.command {
        Command::Serve => {
            let coordinator = RunCoordinator::new(Arc::clone(&pipeline), config.interval());
            coordinator.start();
            println!(
                "Importing {} feeds every {} minutes. Press Ctrl-C to stop.",
                pipeline.registry().list_enabled_feeds().count(),
                config.interval_minutes
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            coordinator.stop();

            let stats = coordinator.get_stats();
            if args.json {
                print_json(&stats)?;
            } else {
                println!(
                    "Stopped after {} runs, {} posts imported.",
                    stats.total_runs_executed, stats.total_items_imported_lifetime
                );
            }
        }
        Command::Import { feed: Some(name) } => {
            let result = pipeline.import_feed_by_name(&name).await?;
            if args.json {
                print_json(&result)?;
            } else {
                print_result(&result);
            }
        }
        Command::Import { feed: None } => {
            let summary = pipeline.import_all().await;
            if args.json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
        Command::ImportUrl {
            url,
            name,
            max_items,
        } => {
            let result = pipeline.import_from_url(&url, &name, max_items).await?;
            if args.json {
                print_json(&result)?;
            } else {
                print_result(&result);
            }
        }
        Command::Counts => {
            let counts = pipeline
                .get_feed_post_counts()
                .await
                .context("Failed to count posts")?;
            if args.json {
                print_json(&counts)?;
            } else {
                for (feed, count) in counts {
                    println!("{:>6}  {}", count, feed);
                }
            }
        }
        Command::Clear { name } => {
            let deleted = pipeline
                .clear_feed_posts(&name)
                .await
                .with_context(|| format!("Failed to clear posts for {}", name))?;
            println!("Deleted {} posts from {}.", deleted, name);
        }
        Command::Feeds if args.json => print_json(pipeline.list_feeds())?,
        Command::Feeds => print_feeds(pipeline.registry()),
    }

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_feeds(registry: &FeedRegistry) {
    for feed in registry.list_feeds() {
        let state = if feed.enabled { "on " } else { "off" };
        println!("[{}] {} ({}, max {})", state, feed.name, feed.url, feed.max_items);
        if !feed.keywords.is_empty() {
            println!("      keywords: {}", feed.keywords.join(", "));
        }
        if !feed.exclude_keywords.is_empty() {
            println!("      exclude:  {}", feed.exclude_keywords.join(", "));
        }
    }
}

fn print_result(result: &FeedImportResult) {
    let status = if result.success { "ok" } else { "FAILED" };
    println!(
        "{}: {} (imported {}, skipped {})",
        result.feed_name, status, result.imported, result.skipped
    );
    for error in &result.errors {
        println!("    {}", error);
    }
}

fn print_summary(summary: &BatchSummary) {
    for result in &summary.results {
        print_result(result);
    }
    println!(
        "{}/{} feeds succeeded, {} posts imported in {}s.",
        summary.successful_feeds,
        summary.total_feeds,
        summary.total_imported,
        (summary.finished_at - summary.started_at).num_seconds()
    );
}
