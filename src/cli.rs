use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codex")]
#[command(author, version, about = "Local media library indexer with catalog artwork")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the library, fetch metadata and artwork, and print the result
    Scan {
        /// Library root (defaults to the configured one)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save the library root to the config file
    SetRoot {
        /// Directory containing movies/, shows/ and podcasts/
        path: PathBuf,
    },

    /// Print the configured library root
    Root,

    /// Print the cache filename for an artwork reference
    CacheKey {
        /// Artwork reference as returned by the catalog (e.g. /abc.jpg)
        reference: String,
    },

    /// Display version information
    Version,
}
