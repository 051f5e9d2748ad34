//! evmledger CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use evmledger_chain::{init_logging, ChainConfig};
use std::path::{Path, PathBuf};

mod commands;

#[derive(Parser)]
#[command(name = "evmledger")]
#[command(about = "Ledger integrity tools: units, hashing, signatures, Merkle proofs", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn load_config(path: Option<&Path>) -> Result<ChainConfig> {
    match path {
        Some(path) => ChainConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(ChainConfig::default()),
    }
}

fn start(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config).context("Failed to initialise logging")?;

    match cli.command {
        Some(cmd) => commands::run(cmd, &config),
        None => {
            println!("evmledger - ledger integrity engine for an EVM-style chain");
            println!("Run 'evmledger --help' for usage information.");
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = start(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_config() {
        assert_eq!(load_config(None).unwrap(), ChainConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = ChainConfig {
            chain_id: 42,
            ..ChainConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(load_config(Some(path.as_path())).unwrap().chain_id, 42);

        assert!(load_config(Some(dir.path().join("missing.json").as_path())).is_err());
    }
}
