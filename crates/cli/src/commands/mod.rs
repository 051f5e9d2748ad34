//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;
use evmledger_chain::ChainConfig;

mod crypto;
mod demo;
mod merkle;
mod units;

#[derive(Subcommand)]
pub enum Commands {
    /// Convert and combine unit amounts
    Units(units::UnitsArgs),
    /// Keccak-256 of a message
    Hash(crypto::HashArgs),
    /// Generate a keypair
    Keygen(crypto::KeygenArgs),
    /// Sign a message with a private key
    Sign(crypto::SignArgs),
    /// Verify a signature against a public key
    Verify(crypto::VerifyArgs),
    /// Recover the signer address of a signed message
    Recover(crypto::RecoverArgs),
    /// Build a Merkle tree and print its root and proofs
    Merkle(merkle::MerkleArgs),
    /// Build a small chain end to end
    Demo(demo::DemoArgs),
}

pub fn run(cmd: Commands, config: &ChainConfig) -> Result<()> {
    match cmd {
        Commands::Units(args) => units::run(args),
        Commands::Hash(args) => crypto::hash(args),
        Commands::Keygen(args) => crypto::keygen(args),
        Commands::Sign(args) => crypto::sign(args),
        Commands::Verify(args) => crypto::verify(args),
        Commands::Recover(args) => crypto::recover(args),
        Commands::Merkle(args) => merkle::run(args),
        Commands::Demo(args) => demo::run(args, config),
    }
}
