mod bridge;
mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, ledger::LedgerSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "engagerunner",
    about = "Paced, idempotent hearts and likes on your channel's comments",
    version,
    propagate_version = true
)]
struct Cli {
    /// State directory (default: ~/.engagerunner)
    #[arg(long, global = true, env = "ENGAGERUNNER_HOME")]
    home: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config.yaml
    Init {
        /// Channel URL for the `main` profile
        #[arg(long)]
        channel: Option<String>,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Inspect and validate the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Run a scenario against a profile's channel
    Engage {
        /// Scenario name (default: defaults.scenario)
        #[arg(long)]
        scenario: Option<String>,

        /// Profile name (default: defaults.profile)
        #[arg(long)]
        profile: Option<String>,

        /// Report what would be done without acting or touching the ledger
        #[arg(long)]
        dry_run: bool,
    },

    /// List the videos a scenario would visit
    Videos {
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long)]
        profile: Option<String>,
    },

    /// Inspect the action ledger
    Ledger {
        #[command(subcommand)]
        subcommand: LedgerSubcommand,
    },

    /// Generate a reply to a comment through the LLM fallback chain
    Reply {
        /// Comment text to reply to
        #[arg(long)]
        comment: String,

        /// Extra context for the prompt (video title, channel voice)
        #[arg(long)]
        context: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Engage { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = engage_core::paths::resolve_home(cli.home.as_deref())
        .map_err(anyhow::Error::from)
        .and_then(|home| match cli.command {
            Commands::Init { channel, force } => cmd::init::run(&home, channel.as_deref(), force),
            Commands::Config { subcommand } => cmd::config::run(&home, subcommand, cli.json),
            Commands::Engage {
                scenario,
                profile,
                dry_run,
            } => cmd::engage::run(
                &home,
                scenario.as_deref(),
                profile.as_deref(),
                dry_run,
                cli.json,
            ),
            Commands::Videos { scenario, profile } => {
                cmd::videos::run(&home, scenario.as_deref(), profile.as_deref(), cli.json)
            }
            Commands::Ledger { subcommand } => cmd::ledger::run(&home, subcommand, cli.json),
            Commands::Reply { comment, context } => {
                cmd::reply::run(&home, &comment, context.as_deref(), cli.json)
            }
        });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
