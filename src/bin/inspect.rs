//! AtlasDB Inspection Tool
//!
//! Read-only views of a database file: header, tables, records, free space,
//! and a structural check. Output is one JSON document per line.

use std::fs::{File, OpenOptions};
use std::io;
use std::ops::ControlFlow;
use std::path::PathBuf;

use atlasdb::{guard_internal, Config, Database, ErrorKind, SyncStrategy};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasDB inspector
#[derive(Parser, Debug)]
#[command(name = "atlasdb-inspect")]
#[command(about = "Inspect an AtlasDB database file")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./atlas.db")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the file header
    Header,

    /// List tables with their schema and row count
    Tables,

    /// Print the records of a table in key order
    Dump {
        /// Table name
        table: String,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List idle segments in allocation order
    Idle,

    /// Check every tree and report totals
    Verify,
}

fn main() {
    // Initialize tracing/logging; stdout carries the JSON output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,atlasdb=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("AtlasDB inspect v{} on {}", atlasdb::VERSION, args.file.display());

    let result = guard_internal(|| run(&args));
    if let Err(e) = result {
        tracing::error!("{}", e);
        let code = match e.kind() {
            ErrorKind::FileFormat => 2,
            ErrorKind::Internal => 3,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run(args: &Args) -> atlasdb::Result<()> {
    let config = Config::builder()
        .path(&args.file)
        .create_if_missing(false)
        .sync_strategy(SyncStrategy::Manual)
        .build();

    // Read-only handle: none of the commands below commit
    let file: File = OpenOptions::new().read(true).open(&config.path)?;
    let mut db = Database::open(file, config)?;

    match &args.command {
        Commands::Header => {
            println!("{}", to_json(db.header())?);
        }
        Commands::Tables => {
            for name in db.table_names()? {
                let spec = db.table_spec(&name)?;
                let columns: Vec<_> = spec
                    .columns()
                    .iter()
                    .map(|c| json!({ "name": c.name(), "type": format!("{:?}", c.column_type()) }))
                    .collect();
                let line = json!({
                    "name": spec.name(),
                    "key": {
                        "name": spec.key_column().name(),
                        "type": format!("{:?}", spec.key_column().column_type()),
                    },
                    "columns": columns,
                    "rows": spec.row_count(),
                    "next_counter": spec.next_counter(),
                    "root": spec.root(),
                });
                println!("{}", line);
            }
        }
        Commands::Dump { table, limit } => {
            let limit = limit.unwrap_or(usize::MAX);
            let mut printed = 0;
            let mut failure = None;
            db.for_each(table, |record| {
                if printed >= limit {
                    return ControlFlow::Break(());
                }
                match serde_json::to_string(&record) {
                    Ok(line) => println!("{}", line),
                    Err(e) => {
                        failure = Some(e);
                        return ControlFlow::Break(());
                    }
                }
                printed += 1;
                ControlFlow::Continue(())
            })?;
            if let Some(e) = failure {
                return Err(io::Error::from(e).into());
            }
        }
        Commands::Idle => {
            for (address, size) in db.idle_segments()? {
                println!("{}", json!({ "address": address, "size": size }));
            }
        }
        Commands::Verify => {
            let report = db.verify()?;
            println!("{}", to_json(&report)?);
        }
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> atlasdb::Result<String> {
    Ok(serde_json::to_string(value).map_err(io::Error::from)?)
}
