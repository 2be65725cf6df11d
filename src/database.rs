//! Database Module
//!
//! The coordinator that ties the file, the allocator and the table trees
//! together.
//!
//! ## Responsibilities
//! - Resolve table names through the directory and keep opened tables
//! - Run record operations against the owning table index
//! - Commit after every mutating operation (flush protocol below)
//!
//! ## Commit
//! 1. Flush every open record tree; fold moved roots into table specs
//! 2. Rewrite changed specs in the directory (same size, in place)
//! 3. Flush the directory tree, then the idle-segment tree
//! 4. Write the file header if a root or the next-free offset moved
//! 5. Sync the stream (per `SyncStrategy`) and trim oversized caches
//!
//! A failure part way leaves some nodes written and others not; there is no
//! multi-segment atomic commit.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::ops::ControlFlow;

use serde::Serialize;

use crate::column::Value;
use crate::config::{Config, SyncStrategy};
use crate::error::{AtlasError, Result};
use crate::storage::{
    Address, FileAccessor, FileHeader, IoStats, RootSlot, SegmentAllocator, StorageFile,
};
use crate::table::{Record, TableDirectory, TableIndex, TableSpec};

/// Summary returned by [`Database::verify`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub tables: Vec<TableReport>,
    pub directory_height: u8,
    pub idle_segments: u64,
    pub idle_height: u8,
    /// Payload bytes held by idle segments
    pub idle_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub name: String,
    pub rows: u64,
    pub height: u8,
}

/// A single-file table store over a caller-owned stream
///
/// ## Concurrency Model
///
/// Single-threaded: every call runs its reads and writes to completion on
/// the calling thread. The database assumes exclusive use of the stream;
/// sharing one file between instances is the caller's problem.
pub struct Database<F: StorageFile> {
    /// Database configuration
    config: Config,

    /// Header and segment I/O
    file: FileAccessor<F>,

    /// Idle-segment tree
    allocator: SegmentAllocator,

    /// Name → table spec tree
    directory: TableDirectory,

    /// Tables opened so far in this session
    tables: HashMap<String, TableIndex>,
}

impl Database<File> {
    /// Create a new database file at `config.path`; fails if it exists
    pub fn create_path(config: Config) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&config.path)?;
        tracing::info!("creating database {}", config.path.display());
        Self::create(file, config)
    }

    /// Open the database file at `config.path`
    ///
    /// Creates it when missing and `config.create_if_missing` is set.
    pub fn open_path(config: Config) -> Result<Self> {
        if !config.path.exists() && config.create_if_missing {
            return Self::create_path(config);
        }
        let file = OpenOptions::new().read(true).write(true).open(&config.path)?;
        tracing::info!("opening database {}", config.path.display());
        Self::open(file, config)
    }
}

impl<F: StorageFile> Database<F> {
    /// Format `file` as an empty database
    pub fn create(file: F, config: Config) -> Result<Self> {
        let mut file = FileAccessor::create(file)?;
        if config.sync_strategy == SyncStrategy::EveryCommit {
            file.sync()?;
        }
        Ok(Self::assemble(file, config))
    }

    /// Open an existing database in `file`
    ///
    /// On open:
    /// 1. Read and validate the header
    /// 2. Attach the directory and idle trees at their stored roots
    /// 3. Optionally verify every tree
    pub fn open(file: F, config: Config) -> Result<Self> {
        let file = FileAccessor::open(file)?;
        let verify = config.verify_on_open;
        let mut db = Self::assemble(file, config);
        if verify {
            let report = db.verify()?;
            tracing::debug!(
                "verified {} tables, {} idle segments",
                report.tables.len(),
                report.idle_segments
            );
        }
        Ok(db)
    }

    fn assemble(file: FileAccessor<F>, config: Config) -> Self {
        let header = file.header();
        let allocator = SegmentAllocator::new(header.root(RootSlot::IdleSegments));
        let directory = TableDirectory::new(header.root(RootSlot::TableDirectory));
        Self {
            config,
            file,
            allocator,
            directory,
            tables: HashMap::new(),
        }
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Create a table from `spec`
    pub fn create_table(&mut self, spec: TableSpec) -> Result<()> {
        let address = self.directory.create(&mut self.file, &mut self.allocator, &spec)?;
        let name = spec.name().to_string();
        self.tables.insert(name, TableIndex::new(spec, address));
        self.commit()
    }

    /// Drop table `name`, releasing every record segment
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.open_table(name)?;
        let Some(mut index) = self.tables.remove(name) else {
            return Err(AtlasError::TableNotFound(name.to_string()));
        };

        let addresses = index.node_addresses(&mut self.file)?;
        for address in &addresses {
            self.allocator.release(&mut self.file, *address)?;
        }
        self.directory.remove(&mut self.file, &mut self.allocator, name)?;
        tracing::debug!("released {} record segments of {}", addresses.len(), name);
        self.commit()
    }

    /// Table names in byte order
    pub fn table_names(&mut self) -> Result<Vec<String>> {
        self.directory.names(&mut self.file)
    }

    pub fn table_spec(&mut self, name: &str) -> Result<TableSpec> {
        Ok(self.table(name)?.spec().clone())
    }

    pub fn row_count(&mut self, name: &str) -> Result<u32> {
        Ok(self.table(name)?.spec().row_count())
    }

    fn open_table(&mut self, name: &str) -> Result<()> {
        if self.tables.contains_key(name) {
            return Ok(());
        }
        let (address, spec) = self
            .directory
            .lookup(&mut self.file, name)?
            .ok_or_else(|| AtlasError::TableNotFound(name.to_string()))?;
        tracing::debug!("opened table {} ({} rows)", name, spec.row_count());
        self.tables.insert(name.to_string(), TableIndex::new(spec, address));
        Ok(())
    }

    fn table(&mut self, name: &str) -> Result<&mut TableIndex> {
        self.open_table(name)?;
        self.tables
            .get_mut(name)
            .ok_or_else(|| AtlasError::TableNotFound(name.to_string()))
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Insert `record` into `table`; returns the record's key
    pub fn insert(&mut self, table: &str, record: &Record) -> Result<Value> {
        self.open_table(table)?;
        let index = lookup_open(&mut self.tables, table)?;
        let key = index.insert(&mut self.file, &mut self.allocator, record)?;
        self.commit()?;
        Ok(key)
    }

    /// Record under `key`, or `None`
    pub fn find(&mut self, table: &str, key: impl Into<Value>) -> Result<Option<Record>> {
        let key = key.into();
        self.open_table(table)?;
        let index = lookup_open(&mut self.tables, table)?;
        let found = index.find(&mut self.file, &key)?;
        self.trim_caches();
        Ok(found)
    }

    /// Delete the record under `key`; `KeyNotFound` when absent
    pub fn delete(&mut self, table: &str, key: impl Into<Value>) -> Result<()> {
        let key = key.into();
        self.open_table(table)?;
        let index = lookup_open(&mut self.tables, table)?;
        index.delete(&mut self.file, &mut self.allocator, &key)?;
        self.commit()
    }

    /// Overwrite columns of the record under `key`
    pub fn replace(&mut self, table: &str, key: impl Into<Value>, record: &Record) -> Result<()> {
        let key = key.into();
        self.open_table(table)?;
        let index = lookup_open(&mut self.tables, table)?;
        index.replace(&mut self.file, &mut self.allocator, &key, record)?;
        self.commit()
    }

    /// Visit records of `table` in key order; returns `false` if stopped early
    pub fn for_each<V>(&mut self, table: &str, visit: V) -> Result<bool>
    where
        V: FnMut(Record) -> ControlFlow<()>,
    {
        self.open_table(table)?;
        let index = lookup_open(&mut self.tables, table)?;
        let complete = index.iterate(&mut self.file, visit)?;
        self.trim_caches();
        Ok(complete)
    }

    /// All records of `table` in key order
    pub fn records(&mut self, table: &str) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        self.for_each(table, |record| {
            out.push(record);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    // =========================================================================
    // Commit
    // =========================================================================

    fn commit(&mut self) -> Result<()> {
        let mut record_nodes = 0;
        for index in self.tables.values_mut() {
            record_nodes += index.flush(&mut self.file)?;
            if index.spec_dirty() {
                self.directory
                    .update(&mut self.file, index.directory_address(), index.spec())?;
                index.mark_spec_clean();
            }
        }
        let directory_nodes = self.directory.flush(&mut self.file)?;
        let idle_nodes = self.allocator.flush(&mut self.file)?;
        let header_written = self.file.commit_header()?;

        if self.config.sync_strategy == SyncStrategy::EveryCommit {
            self.file.sync()?;
        }
        tracing::debug!(
            "commit: {} record, {} directory, {} idle nodes{}",
            record_nodes,
            directory_nodes,
            idle_nodes,
            if header_written { ", header" } else { "" }
        );

        self.trim_caches();
        Ok(())
    }

    /// Drop any tree cache above the configured limit
    ///
    /// Only called with every tree clean.
    fn trim_caches(&mut self) {
        let limit = self.config.node_cache_limit;
        self.allocator.trim_cache(limit);
        self.directory.trim_cache(limit);
        for index in self.tables.values_mut() {
            index.trim_cache(limit);
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Idle segments in ascending size order as (address, payload size)
    pub fn idle_segments(&mut self) -> Result<Vec<(Address, u32)>> {
        self.allocator.idle_segments(&mut self.file)
    }

    /// Check every tree: links, heights, balance, key order and row counts
    pub fn verify(&mut self) -> Result<VerifyReport> {
        let result = self.verify_trees();
        if let Err(e) = &result {
            tracing::warn!("verification failed: {}", e);
        }
        self.trim_caches();
        result
    }

    fn verify_trees(&mut self) -> Result<VerifyReport> {
        let directory = self.directory.check(&mut self.file)?;
        let idle = self.allocator.check(&mut self.file)?;
        let idle_bytes = self
            .allocator
            .idle_segments(&mut self.file)?
            .iter()
            .map(|(_, size)| *size as u64)
            .sum();

        let mut tables = Vec::new();
        for name in self.directory.names(&mut self.file)? {
            self.open_table(&name)?;
            let index = lookup_open(&mut self.tables, &name)?;
            let check = index.check(&mut self.file)?;
            tables.push(TableReport {
                name,
                rows: check.nodes,
                height: check.height,
            });
        }

        Ok(VerifyReport {
            tables,
            directory_height: directory.height,
            idle_segments: idle.nodes,
            idle_height: idle.height,
            idle_bytes,
        })
    }

    /// Push written data down to the device
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }

    pub fn header(&self) -> &FileHeader {
        self.file.header()
    }

    pub fn stats(&self) -> IoStats {
        self.file.stats()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Hand the stream back to the caller
    pub fn into_inner(self) -> F {
        self.file.into_inner()
    }
}

fn lookup_open<'a>(
    tables: &'a mut HashMap<String, TableIndex>,
    name: &str,
) -> Result<&'a mut TableIndex> {
    tables
        .get_mut(name)
        .ok_or_else(|| AtlasError::TableNotFound(name.to_string()))
}
