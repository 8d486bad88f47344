//! Roost sync daemon.
//!
//! Periodically sweeps every identity with a ledger: syncs its timeline
//! from upstream, then pings the subscription hub once per sweep with the
//! feed URLs that gained content.
//!
//! # Usage
//!
//! ```bash
//! roost-sync \
//!     --upstream-url https://timeline.example.net/api \
//!     --hub-url https://hub.example.net/ \
//!     --feed-base-url https://feeds.example.net \
//!     --ledger-db ./data/ledgers \
//!     --status-db ./data/statuses
//! ```
//!
//! SIGINT stops the sweep loop and flushes both stores before exit.

use anyhow::{Context, Result};
use clap::Parser;
use roost_core::Identity;
use roost_sync::{
    FeedDirectory, HttpHubTransport, HttpUpstreamSource, HubNotifier, LedgerDb, StatusDb,
    SyncConfig, SyncEngine, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Roost timeline sync daemon.
#[derive(Parser, Debug)]
#[command(name = "roost-sync")]
#[command(about = "Timeline sync daemon: mirrors upstream timelines and pings the hub")]
#[command(version)]
struct Args {
    /// RocksDB path for per-identity ledgers
    #[arg(long, env = "ROOST_LEDGER_DB", default_value = "./data/ledgers")]
    ledger_db: PathBuf,

    /// RocksDB path for status record payloads
    #[arg(long, env = "ROOST_STATUS_DB", default_value = "./data/statuses")]
    status_db: PathBuf,

    /// Base URL of the upstream timeline API
    #[arg(long, env = "ROOST_UPSTREAM_URL")]
    upstream_url: String,

    /// Subscription hub publish endpoint (omit to skip hub pings)
    #[arg(long, env = "ROOST_HUB_URL")]
    hub_url: Option<String>,

    /// Base URL under which feeds are published
    #[arg(long, env = "ROOST_FEED_BASE_URL", default_value = "http://localhost:8080")]
    feed_base_url: String,

    /// feed_id=identity pairs, comma-separated
    #[arg(long, env = "ROOST_FEED_MAP", default_value = "")]
    feed_map: String,

    /// Seconds between sweeps
    #[arg(long, env = "ROOST_SWEEP_INTERVAL", default_value = "300")]
    interval_secs: u64,

    /// Deadline for each outbound HTTP request, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Path to .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,roost_sync=debug".into()),
        )
        .init();

    tracing::info!("roost sync daemon starting");

    let timeout = Duration::from_secs(args.request_timeout_secs);
    let statuses = Arc::new(StatusDb::open(&args.status_db).context("opening status store")?);
    let ledgers = Arc::new(LedgerDb::open(&args.ledger_db).context("opening ledger store")?);
    let source = HttpUpstreamSource::new(&args.upstream_url, timeout)?;
    let engine = SyncEngine::new(
        source,
        statuses.clone(),
        ledgers.clone(),
        SystemClock,
        SyncConfig::default(),
    );

    let notifier = match &args.hub_url {
        Some(url) => Some(HubNotifier::new(HttpHubTransport::new(url, timeout)?)),
        None => {
            tracing::warn!("no hub URL configured, feed changes will not be published");
            None
        }
    };

    let directory = FeedDirectory::parse(&args.feed_map).context("parsing feed map")?;
    let feed_base = args.feed_base_url.trim_end_matches('/').to_string();
    let interval = Duration::from_secs(args.interval_secs);

    loop {
        sweep(&engine, &ledgers, &directory, &feed_base, notifier.as_ref()).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    statuses.flush()?;
    ledgers.flush()?;
    tracing::info!(
        statuses = statuses.approximate_count().unwrap_or(0),
        ledgers = ledgers.approximate_count().unwrap_or(0),
        "stores flushed, exiting"
    );
    Ok(())
}

/// Identities to sync this sweep: everything with a ledger already, plus
/// every configured feed identity. Ledgers are created lazily on first
/// sync, so on a fresh deployment only the configured set exists; without
/// it no first sync would ever run.
fn sweep_targets(directory: &FeedDirectory, with_ledgers: Vec<Identity>) -> Vec<Identity> {
    let mut seen: std::collections::HashSet<Identity> = with_ledgers.iter().cloned().collect();
    let mut targets = with_ledgers;
    for identity in directory.identities() {
        if seen.insert(identity.clone()) {
            targets.push(identity.clone());
        }
    }
    targets
}

/// One pass over every identity: sync, collect changed feeds, ping hub.
async fn sweep(
    engine: &SyncEngine<HttpUpstreamSource, StatusDb, LedgerDb, SystemClock>,
    ledgers: &LedgerDb,
    directory: &FeedDirectory,
    feed_base: &str,
    notifier: Option<&HubNotifier<HttpHubTransport>>,
) {
    let with_ledgers = match ledgers.identities() {
        Ok(identities) => identities,
        Err(e) => {
            tracing::error!(error = %e, "listing identities failed, skipping sweep");
            return;
        }
    };
    let identities = sweep_targets(directory, with_ledgers);
    tracing::info!(identities = identities.len(), "starting sweep");

    let mut changed_feeds = Vec::new();
    for identity in &identities {
        match engine.sync(identity).await {
            Ok(outcome) if outcome.had_update => match directory.feed_id_for(identity) {
                Some(feed_id) => changed_feeds.push(format!("{feed_base}/feed/{feed_id}")),
                None => {
                    tracing::debug!(identity = %identity, "updated identity has no published feed")
                }
            },
            Ok(_) => {}
            Err(e) => tracing::error!(identity = %identity, error = %e, "sync failed"),
        }
    }

    tracing::info!(updated = changed_feeds.len(), "sweep finished");

    if let (Some(notifier), false) = (notifier, changed_feeds.is_empty()) {
        let stats = notifier.notify(&changed_feeds).await;
        if stats.batches_failed > 0 {
            tracing::warn!(failed = stats.batches_failed, "some hub batches failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_deployment_sweeps_configured_identities() {
        let directory = FeedDirectory::parse("f1=alice,f2=bob").unwrap();

        // No ledgers yet: the configured identities still get their
        // first sync.
        let mut targets = sweep_targets(&directory, vec![]);
        targets.sort();
        assert_eq!(targets, vec![Identity::new("alice"), Identity::new("bob")]);
    }

    #[test]
    fn sweep_targets_union_ledgers_and_configured() {
        let directory = FeedDirectory::parse("f1=alice,f2=bob").unwrap();
        let with_ledgers = vec![Identity::new("bob"), Identity::new("carol")];

        let mut targets = sweep_targets(&directory, with_ledgers);
        targets.sort();
        assert_eq!(
            targets,
            vec![
                Identity::new("alice"),
                Identity::new("bob"),
                Identity::new("carol"),
            ]
        );
    }
}
