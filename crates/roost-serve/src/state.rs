//! Application state and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use roost_sync::{FeedDirectory, FeedResolver, LedgerDb, StatusDb};

use crate::window::WindowConfig;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Path to the sync daemon's ledger store (primary).
    pub ledger_db: PathBuf,

    /// Path to the sync daemon's status store (primary).
    pub status_db: PathBuf,

    /// Scratch directory for this process's secondary store instances.
    pub secondary_dir: PathBuf,

    /// Feed-id to identity mapping, `feed_id=identity` comma-separated.
    pub feed_map: String,

    /// Window selection policy.
    pub window: WindowConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `ROOST_LEDGER_DB`: Path to the sync daemon's ledger store
    /// - `ROOST_STATUS_DB`: Path to the sync daemon's status store
    /// - `ROOST_FEED_MAP`: Comma-separated `feed_id=identity` pairs
    ///
    /// Optional environment variables:
    /// - `ROOST_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `ROOST_SECONDARY_DIR`: Scratch dir for secondary store instances
    ///   (default: "./roost-serve-secondary")
    /// - `ROOST_AGGREGATOR_USER_AGENTS`: Comma-separated user-agent
    ///   substrings that mark frequent pollers (default: "feedfetcher")
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("ROOST_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let ledger_db = std::env::var("ROOST_LEDGER_DB")
            .map(PathBuf::from)
            .map_err(|_| anyhow::anyhow!("ROOST_LEDGER_DB environment variable is required"))?;

        let status_db = std::env::var("ROOST_STATUS_DB")
            .map(PathBuf::from)
            .map_err(|_| anyhow::anyhow!("ROOST_STATUS_DB environment variable is required"))?;

        let secondary_dir = std::env::var("ROOST_SECONDARY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./roost-serve-secondary"));

        let feed_map = std::env::var("ROOST_FEED_MAP")
            .map_err(|_| anyhow::anyhow!("ROOST_FEED_MAP environment variable is required"))?;

        let mut window = WindowConfig::default();
        if let Ok(agents) = std::env::var("ROOST_AGGREGATOR_USER_AGENTS") {
            let agents: Vec<String> = agents
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !agents.is_empty() {
                window.aggregator_user_agents = agents;
            }
        }

        tracing::info!(
            bind_addr = %bind_addr,
            ledger_db = %ledger_db.display(),
            status_db = %status_db.display(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            ledger_db,
            status_db,
            secondary_dir,
            feed_map,
            window,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Secondary (read) instance of the ledger store.
    pub ledgers: Arc<LedgerDb>,

    /// Secondary (read) instance of the status store.
    pub statuses: Arc<StatusDb>,

    /// Feed-id resolution boundary.
    pub resolver: Arc<dyn FeedResolver>,

    /// Window selection policy.
    pub window: Arc<WindowConfig>,
}

impl AppState {
    /// Open secondary store instances and build the application state.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.secondary_dir)?;

        let ledgers = LedgerDb::open_secondary(
            config.ledger_db.clone(),
            config.secondary_dir.join("ledgers"),
        )?;
        let statuses = StatusDb::open_secondary(
            config.status_db.clone(),
            config.secondary_dir.join("statuses"),
        )?;

        let directory = FeedDirectory::parse(&config.feed_map)?;
        tracing::info!(feeds = directory.len(), "feed directory loaded");

        Ok(Self {
            ledgers: Arc::new(ledgers),
            statuses: Arc::new(statuses),
            resolver: Arc::new(directory),
            window: Arc::new(config.window.clone()),
        })
    }

    /// Pick up the sync daemon's latest writes before a read.
    pub fn catch_up(&self) -> roost_sync::Result<()> {
        self.ledgers.catch_up()?;
        self.statuses.catch_up()?;
        Ok(())
    }
}
