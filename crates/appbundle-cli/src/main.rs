//! appbundle CLI - inspect and manipulate application bundles
//!
//! Commands:
//! - `appbundle inspect` - Show the manifest, files and entrypoints of a bundle
//! - `appbundle validate` - Run the full validation pass and verify payloads
//! - `appbundle merge` - Combine two bundles under a conflict policy
//! - `appbundle pack` - Build a bundle from a directory
//! - `appbundle unpack` - Extract a bundle into a directory

use appbundle::ConflictResolution;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod inspect;
mod merge;
mod pack;
mod unpack;
mod validate;

#[derive(Parser)]
#[command(name = "appbundle")]
#[command(author, version, about = "Inspect and manipulate application bundles", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to an appbundle.toml with parse, serialize and merge options
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the manifest, files and entrypoints of a bundle
    Inspect {
        /// Bundle to inspect
        bundle: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a bundle and verify every payload
    Validate {
        /// Bundle to validate
        bundle: PathBuf,

        /// Report unlisted archive entries as warnings instead of errors
        #[arg(long)]
        lenient: bool,

        /// Print the validation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge two bundles into a new one
    Merge {
        /// Base bundle
        base: PathBuf,

        /// Bundle merged on top of the base
        other: PathBuf,

        /// Output path for the merged bundle
        #[arg(short, long)]
        output: PathBuf,

        /// Policy for files that differ (error, skip, replace)
        #[arg(long)]
        on_conflict: Option<ConflictResolution>,

        /// Policy for entrypoints that differ (error, skip, replace)
        #[arg(long)]
        on_entrypoint_conflict: Option<ConflictResolution>,
    },

    /// Build a bundle from the files in a directory
    Pack {
        /// Directory to pack
        dir: PathBuf,

        /// Output path for the bundle; `.bundle` is added when no extension is given
        #[arg(short, long)]
        output: PathBuf,

        /// Entrypoint as NAME=TARGET (repeatable); TARGET may be a path or @NAME
        #[arg(short, long = "entrypoint", value_name = "NAME=TARGET")]
        entrypoints: Vec<String>,
    },

    /// Extract every file of a bundle into a directory
    Unpack {
        /// Bundle to extract
        bundle: PathBuf,

        /// Destination directory
        dir: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { bundle, json } => {
            inspect::run(&bundle, json, &config)?;
        }
        Commands::Validate {
            bundle,
            lenient,
            json,
        } => {
            validate::run(&bundle, lenient, json, &config)?;
        }
        Commands::Merge {
            base,
            other,
            output,
            on_conflict,
            on_entrypoint_conflict,
        } => {
            merge::run(
                &base,
                &other,
                &output,
                on_conflict,
                on_entrypoint_conflict,
                &config,
            )?;
        }
        Commands::Pack {
            dir,
            output,
            entrypoints,
        } => {
            pack::run(&dir, &output, &entrypoints, &config)?;
        }
        Commands::Unpack { bundle, dir } => {
            unpack::run(&bundle, &dir, &config)?;
        }
    }

    Ok(())
}
