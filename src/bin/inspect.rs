//! atlasenv Pool Inspector
//!
//! Lists the directory registry and dumps or describes individual pools.
//! Pools are opened read-only: a torn tail is skipped, never repaired.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use atlasenv::heap::{Pool, PoolLayout};
use atlasenv::storage::DirectoryRegistry;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// atlasenv pool inspector
#[derive(Parser, Debug)]
#[command(name = "atlasenv-inspect")]
#[command(about = "Inspect atlasenv pools and the directory registry")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every data file recorded in a directory registry
    Registry {
        /// Path of the directory pool
        path: PathBuf,
    },

    /// Print a pool's header and bookkeeping
    Stat {
        /// Path of the pool
        path: PathBuf,
    },

    /// Write a data file's content to stdout
    Cat {
        /// Path of the data file pool
        path: PathBuf,
    },
}

fn main() {
    // Initialize tracing/logging (to stderr, stdout carries file content)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasenv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Commands) -> atlasenv::Result<()> {
    match command {
        Commands::Registry { path } => {
            let registry = DirectoryRegistry::open_read_only(&path)?;
            for (i, entry) in registry.entries()?.iter().enumerate() {
                println!(
                    "{:>4}  pool={:016x}  root={}  {}",
                    i,
                    entry.pool_id,
                    entry.object.id(),
                    entry.path.display()
                );
            }
        }
        Commands::Stat { path } => {
            let header = Pool::read_header(&path)?;
            let pool = Pool::open_read_only(&path, header.layout)?;
            let stats = pool.stats();
            println!("path:       {}", path.display());
            println!("layout:     {}", stats.layout.tag());
            println!("pool id:    {:016x}", stats.pool_id);
            println!("capacity:   {}", stats.capacity);
            println!("used bytes: {}", stats.used_bytes);
            println!("objects:    {}", stats.object_count);
            match (stats.layout, stats.root_child) {
                (PoolLayout::File, Some(content)) => {
                    println!("content:    {} bytes", pool.bytes(content)?.len());
                }
                (PoolLayout::Directory, Some(set)) => {
                    println!("entries:    {}", pool.refs(set)?.len());
                }
                (_, None) => println!("root child: none"),
            }
        }
        Commands::Cat { path } => {
            let pool = Pool::open_read_only(&path, PoolLayout::File)?;
            let content: &[u8] = match pool.stats().root_child {
                Some(content) => pool.bytes(content)?,
                None => &[],
            };

            let stdout = io::stdout();
            let mut out = stdout.lock();
            out.write_all(content)
                .and_then(|_| out.flush())
                .map_err(|e| atlasenv::EnvError::from_io("<stdout>", e))?;
        }
    }

    Ok(())
}
