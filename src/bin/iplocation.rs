mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{cmd_batch, cmd_inspect, cmd_query, cmd_validate};

#[derive(Parser)]
#[command(name = "iplocation")]
#[command(
    about = "Resolve IPv4 addresses against a prefix-indexed geolocation database",
    long_about = "iplocation - IPv4 geolocation lookups against .dat databases\n\n\
    Resolves addresses to continent, country, province, city, zone, ISP,\n\
    administrative code, English names and coordinates.\n\n\
    Examples:\n\
      iplocation query ip.dat 218.88.127.69\n\
      iplocation query ip.dat 1.2.3.4 8.8.8.8 --format json\n\
      iplocation batch ip.dat access-ips.txt.gz --format csv -j auto\n\
      iplocation inspect ip.dat --verbose\n\
      iplocation validate ip.dat --level strict"
)]
#[command(version)]
struct Cli {
    /// Print library diagnostics to stderr at this level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more IPv4 addresses
    Query {
        /// Path to the .dat database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Addresses to resolve
        #[arg(value_name = "IP", required = true)]
        queries: Vec<String>,

        /// Output format: text (default), json, or pipe
        #[arg(long, default_value = "text")]
        format: String,

        /// Reject addresses that are not well-formed dotted quads
        #[arg(long)]
        strict: bool,

        /// Quiet mode - no output, only exit code (0 = all found, 1 = otherwise)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Resolve addresses read from files or stdin (one per line)
    Batch {
        /// Path to the .dat database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Input files, or "-" for stdin; .gz is decompressed
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output format: json (default, NDJSON), csv, or pipe
        #[arg(long, default_value = "json")]
        format: String,

        /// Number of worker threads (default: 1, use "auto" for all cores)
        #[arg(short = 'j', long)]
        threads: Option<String>,

        /// Memory-map the database instead of reading it
        #[arg(long)]
        mmap: bool,

        /// Show statistics on stderr
        #[arg(short, long)]
        stats: bool,
    },

    /// Inspect a database
    Inspect {
        /// Path to the .dat database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// List every prefix bucket
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a database for structural errors
    Validate {
        /// Path to the .dat database
        #[arg(value_name = "DATABASE")]
        database: PathBuf,

        /// Validation level: standard or strict (default)
        #[arg(short, long, default_value = "strict")]
        level: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Show warnings and information
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(level) = cli.log.as_deref() {
        let level: tracing::Level = level
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid log level: '{}'", level))?;
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Query {
            database,
            queries,
            format,
            strict,
            quiet,
        } => cmd_query(database, queries, format, strict, quiet),
        Commands::Batch {
            database,
            inputs,
            format,
            threads,
            mmap,
            stats,
        } => cmd_batch(database, inputs, format, threads, mmap, stats),
        Commands::Inspect {
            database,
            json,
            verbose,
        } => cmd_inspect(database, json, verbose),
        Commands::Validate {
            database,
            level,
            json,
            verbose,
        } => cmd_validate(database, level, json, verbose),
    }
}
