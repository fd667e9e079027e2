use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

mod ai;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod pipeline;
mod services;
mod utils;

use config::Config;
use db::Repository;
use error::Result;
use pipeline::{Pipeline, RunStats, LAST_RUN_KEY};

const USAGE: &str = "Usage:
  autopost                              run one pass over all feeds
  autopost --daemon                     run a pass every poll_interval_minutes
  autopost --add-link <title> <url> [tags]
  autopost --links                      list the internal-link pool
  autopost --show <id>                  show the stored post for a feed item id
  autopost --status                     show when the last pass finished";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Load configuration
    let config = Config::load()?;

    match args.get(1).map(String::as_str) {
        None => {
            let pipeline = Pipeline::from_config(&config).await?;
            let stats = pipeline.run_once().await?;
            print_stats(&stats);
        }

        Some("--daemon") => run_daemon(&config).await?,

        Some("--add-link") if args.len() >= 4 => {
            let repository = Repository::new(&config.db_path).await?;
            let tags = args.get(4).map(String::as_str).unwrap_or_default();
            let id = repository.add_internal_link(&args[2], &args[3], tags).await?;
            println!("Added internal link #{}", id);
        }

        Some("--links") => {
            let repository = Repository::new(&config.db_path).await?;
            for link in repository.list_internal_links().await? {
                println!(
                    "#{} {} {} [{}] {}",
                    link.id,
                    link.title,
                    link.url,
                    link.tags,
                    link.created_at.format("%Y-%m-%d")
                );
            }
        }

        Some("--show") if args.len() >= 3 => {
            let repository = Repository::new(&config.db_path).await?;
            match repository.get_post(&args[2]).await? {
                Some(post) => println!(
                    "{}\n  title: {}\n  slug: {}\n  published: {}\n  platforms: {}\n  lang: {}\n  hash: {}",
                    post.id,
                    post.title,
                    post.slug,
                    post.published_at.to_rfc3339(),
                    post.platforms.join(", "),
                    post.lang,
                    post.content_hash
                ),
                None => println!("Not posted: {}", args[2]),
            }
        }

        Some("--status") => {
            let repository = Repository::new(&config.db_path).await?;
            match repository.get_setting(LAST_RUN_KEY).await? {
                Some(at) => println!("Last run: {}", at),
                None => println!("No run recorded yet"),
            }
            println!("Feeds configured: {}", config.feeds.len());
        }

        Some(_) => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Runs a pass immediately and then every `poll_interval_minutes` until Ctrl-C.
/// A failed pass is logged and the loop keeps going.
async fn run_daemon(config: &Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;
    let period = Duration::from_secs(u64::from(config.poll_interval_minutes.max(1)) * 60);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Polling every {} minutes", config.poll_interval_minutes.max(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match pipeline.run_once().await {
                    Ok(stats) => print_stats(&stats),
                    Err(e) => tracing::error!("Run failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

fn print_stats(stats: &RunStats) {
    println!(
        "Fetched {} items: {} published, {} already posted, {} generation failures, {} publish failures",
        stats.fetched, stats.published, stats.skipped, stats.generation_failed, stats.publish_failed
    );
}
