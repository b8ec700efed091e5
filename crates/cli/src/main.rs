//! Key set CLI for registering and auditing signing keys.
//!
//! This tool provides commands for:
//! - Registering a new RSA signing key and printing its private key
//! - Validating the published key set document
//! - Creating an empty key set
//! - Listing and suggesting key identifiers

use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;

use keyset_common::settings::Settings;

mod error;
mod keys;
mod validate;

use error::CliError;

#[derive(Parser)]
#[command(name = "kscli")]
#[command(about = "Key set CLI for signing key registration and validation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML settings file (default: keyset.toml if present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a new key, append its public half and print the private key PEM
    Register {
        /// Key identifier, e.g. `my-service-20240101`
        #[arg(long)]
        kid: String,
    },

    /// Check the key set against every invariant
    Validate,

    /// Create an empty key set at the configured path
    Init,

    /// List key identifiers grouped by scope
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: ListFormat,
    },

    /// Print the next identifier for a scope
    Suggest {
        /// Owner scope, e.g. `my-service`
        #[arg(long)]
        scope: String,

        /// Version date as YYYYMMDD (default: today, UTC)
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum, Debug)]
pub enum ListFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    init_logger(cli.verbose)?;

    let settings = Settings::load(cli.config.as_deref())?;
    log::debug!("Using key set {}", settings.keyset.path.display());

    let mut out = io::stdout().lock();
    match cli.command {
        Commands::Register { kid } => keys::register(&settings, &kid, &mut out),
        Commands::Validate => validate::validate(&settings, &mut out),
        Commands::Init => keys::init(&settings, &mut out),
        Commands::List { format } => keys::list(&settings, format, &mut out),
        Commands::Suggest { scope, date } => {
            keys::suggest(&settings, &scope, date.as_deref(), &mut out)
        }
    }
}

/// Logs go to stderr; stdout carries only the command's output.
fn init_logger(verbose: bool) -> Result<(), CliError> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .map_err(|e| CliError::Logger(e.to_string()))
}
