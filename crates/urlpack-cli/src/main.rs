#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use tracing::debug;
use urlpack_core::Channel;

#[derive(Parser, Debug)]
#[command(name = "urlpack")]
#[command(author, version, about = "Bundle ES modules with import-map driven URL imports", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Cache channel (stable, nightly, dev)
    #[arg(long, global = true, default_value = "stable")]
    channel: Channel,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Bundle an entry point, fetching remote modules through the cache
    Build {
        /// Entry point file
        entry: String,

        /// Output directory
        #[arg(long, default_value = "dist")]
        outdir: PathBuf,

        /// Import map JSON file ({"imports": {"react": "<url>", ...}})
        #[arg(long, value_name = "FILE")]
        import_map: PathBuf,

        /// Use an in-memory cache for this run only
        #[arg(long)]
        no_cache: bool,
    },

    /// Inspect or clear the remote module cache
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// Print the cache directory
    Dir,
    /// Remove every cached module
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);
    debug!(cwd = %cwd.display(), channel = %cli.channel, "urlpack starting");

    match cli.command {
        None | Some(Commands::Version) => commands::version::run(cli.json),
        Some(Commands::Build {
            entry,
            outdir,
            import_map,
            no_cache,
        }) => {
            let action = commands::build::BuildAction {
                entry,
                outdir,
                import_map,
                cwd,
                no_cache,
                channel: cli.channel,
            };
            commands::build::run(action, cli.json)
        }
        Some(Commands::Cache { cache_cmd }) => match cache_cmd {
            CacheCommands::Dir => commands::cache::dir(cli.channel, cli.json),
            CacheCommands::Clean => commands::cache::clean(cli.channel, cli.json),
        },
    }
}
