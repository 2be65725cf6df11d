//! Configuration for AtlasDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for an AtlasDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Database file, used only by the path-based constructors.
    /// Callers that hand in their own stream never touch it.
    pub path: PathBuf,

    /// Create a fresh file in `open_path` when none exists
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// When to push committed writes down to the device
    pub sync_strategy: SyncStrategy,

    /// Walk every tree and check its structure on open
    pub verify_on_open: bool,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Max cached nodes per tree; larger caches are dropped after a commit
    pub node_cache_limit: usize,
}

/// Sync strategy: when to call `sync` on the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// sync after every commit (safest, slowest)
    EveryCommit,

    /// never sync implicitly; the caller calls `Database::sync`
    Manual,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./atlas.db"),
            create_if_missing: true,
            sync_strategy: SyncStrategy::EveryCommit,
            verify_on_open: false,
            node_cache_limit: 4096,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Create the file on open when it does not exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Verify tree structure when opening
    pub fn verify_on_open(mut self, verify: bool) -> Self {
        self.config.verify_on_open = verify;
        self
    }

    /// Set the per-tree node cache limit
    pub fn node_cache_limit(mut self, limit: usize) -> Self {
        self.config.node_cache_limit = limit;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
