use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use relay_failover::mutation::{apply_action, Action};
use relay_failover::observability::logging;
use relay_failover::routing::{self, lint};

#[derive(Parser)]
#[command(name = "failover-cli")]
#[command(about = "Manual operations on relay routing rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove an upstream from every rule, backing the rules up
    Disable {
        config: PathBuf,
        address: String,
        state: PathBuf,
    },
    /// Restore every rule backed up for an upstream
    Enable {
        config: PathBuf,
        address: String,
        state: PathBuf,
    },
    /// Print every upstream address, one per line
    Upstreams { config: PathBuf },
    /// Check a routing config with the built-in linter
    Validate { config: PathBuf },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_stderr(logging::DEFAULT_FILTER);

    match cli.command {
        Commands::Disable { config, address, state } => {
            mutate(Action::Disable, &config, &address, &state)
        }
        Commands::Enable { config, address, state } => {
            mutate(Action::Enable, &config, &address, &state)
        }
        Commands::Upstreams { config } => {
            let config = routing::load(&config)?;
            for upstream in config.upstreams() {
                println!("{}", upstream);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { config } => {
            let text = std::fs::read_to_string(&config)?;
            match lint::lint_text(&text) {
                Ok(()) => {
                    println!("{}: OK", config.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(errors) => {
                    for error in errors {
                        eprintln!("{}: {}", config.display(), error);
                    }
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn mutate(
    action: Action,
    config: &Path,
    address: &str,
    state: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if apply_action(config, state, action, address)? {
        tracing::info!(action = %action, address, "Configuration updated");
    } else {
        tracing::info!(action = %action, address, "Nothing to change");
    }
    Ok(ExitCode::SUCCESS)
}
