//! medisync-cli
//!
//! Offline companions to the server endpoints, driven entirely by local
//! files: ingest a CSV into a CodeSystem, search a CSV-derived index and
//! validate a bundle against CSV-derived code systems.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "medisync-cli", version, about = "Offline MediSync terminology tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest a delimited file and print the CodeSystem with its outcome
    Ingest {
        /// Path to the CSV/TSV file
        file: PathBuf,
        /// Code system name
        #[arg(long)]
        name: String,
        /// Canonical URL of the code system
        #[arg(long)]
        url: String,
        /// comma, tab, semicolon or pipe; inferred from a .tsv extension
        #[arg(long)]
        delimiter: Option<String>,
    },
    /// Build an index from a delimited file and print a ValueSet expansion
    Search {
        file: PathBuf,
        #[arg(long)]
        url: String,
        #[arg(long, short)]
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        delimiter: Option<String>,
    },
    /// Validate a bundle file against code systems built from delimited files
    Validate {
        /// Path to the Bundle JSON
        bundle: PathBuf,
        /// Code system file; repeat for several systems
        #[arg(long = "codes", required = true)]
        codes: Vec<PathBuf>,
        /// Canonical URL for each `--codes` file, in the same order
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
        /// Reject entries without a resolvable classification coding
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Ingest {
            file,
            name,
            url,
            delimiter,
        } => commands::ingest(&file, &name, &url, delimiter.as_deref()),
        Command::Search {
            file,
            url,
            query,
            limit,
            offset,
            delimiter,
        } => commands::search(&file, &url, &query, limit, offset, delimiter.as_deref()),
        Command::Validate {
            bundle,
            codes,
            urls,
            strict,
        } => commands::validate(&bundle, &codes, &urls, strict).await,
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
