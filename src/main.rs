//! # SQUID CLI (`squid`)
//!
//! Identifies unknown SQLite databases by comparing their schemas against a
//! catalog of schemas learned from known program versions.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `squid init` | Create the catalog database |
//! | `squid learn <path> --program P --version V` | Add databases of a known program to the catalog |
//! | `squid compare <path>` | Rank unknown databases against the catalog |
//! | `squid stats` | Summarize the catalog |
//!
//! ## Examples
//!
//! ```bash
//! # Catalog a Firefox profile directory
//! squid learn ~/profiles/ff47 --program Firefox --version 47 --family Browser
//!
//! # Identify everything recovered from an image
//! squid compare ./recovered --output case-12
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use squid::{compare, config, learn, migrate, stats};
use squid_core::models::ProgramIdentity;

/// SQUID: SQLite Unknown Identifier.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without it, `./config/squid.toml` is used when present.
#[derive(Parser)]
#[command(
    name = "squid",
    about = "SQUID: identify unknown SQLite databases by their schema",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug detail to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog database. Safe to run repeatedly.
    Init,

    /// Rank unknown databases against the catalog.
    ///
    /// A directory is searched recursively. The top three catalog matches
    /// for every readable database are written to a JSON report.
    Compare {
        /// Database file or directory to examine.
        path: PathBuf,

        /// Label to report a single file under instead of its file name.
        #[arg(long)]
        name: Option<String>,

        /// Report name, written as `<output>.json`.
        #[arg(long)]
        output: Option<String>,
    },

    /// Add databases of a known program version to the catalog.
    ///
    /// A directory contributes the files directly inside it.
    Learn {
        /// Database file or directory to learn.
        path: PathBuf,

        /// Program that produced the databases.
        #[arg(long)]
        program: String,

        /// Program version.
        #[arg(long)]
        version: String,

        /// Program family, e.g. `Browser`.
        #[arg(long)]
        family: Option<String>,

        /// Database name to record instead of the file name.
        #[arg(long)]
        name: Option<String>,

        /// What to do when the schema is already catalogued:
        /// `ask`, `merge`, `new`, or `skip`.
        #[arg(long, value_parser = ["ask", "merge", "new", "skip"])]
        on_match: Option<String>,
    },

    /// Summarize the catalog.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Catalog initialized at {}.", cfg.catalog.path.display());
        }
        Commands::Compare { path, name, output } => {
            compare::run_compare(&cfg, &path, name.as_deref(), output.as_deref()).await?;
        }
        Commands::Learn {
            path,
            program,
            version,
            family,
            name,
            on_match,
        } => {
            let identity = ProgramIdentity {
                program_family: family,
                program_name: program,
                program_version: version,
            };
            learn::run_learn(&cfg, &path, &identity, name.as_deref(), on_match.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
