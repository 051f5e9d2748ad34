//! Hashing, key and signature commands.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use evmledger_core::crypto;
use evmledger_core::hash::{hash_tagged, keccak256, LEAF_TAG, NODE_TAG};
use evmledger_core::Keypair;
use std::fs;
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum Tag {
    Leaf,
    Merkle,
}

#[derive(Args)]
pub struct HashArgs {
    /// Message to hash
    message: String,

    /// Treat the message as hex-encoded bytes
    #[arg(long)]
    hex: bool,

    /// Domain tag to prefix before hashing
    #[arg(short, long, value_enum)]
    tag: Option<Tag>,
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Derive from an existing private key instead of generating one
    #[arg(short, long)]
    private_key: Option<String>,

    /// Write the keypair to this JSON file
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
pub struct SignArgs {
    /// Message to sign
    message: String,

    /// Private key (hex)
    #[arg(short, long)]
    key: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Signed message
    message: String,

    /// Signature (0x || r || s || v)
    signature: String,

    /// Public key (hex, compressed or uncompressed)
    #[arg(short, long)]
    public_key: String,
}

#[derive(Args)]
pub struct RecoverArgs {
    /// Signed message
    message: String,

    /// Signature (0x || r || s || v)
    signature: String,
}

pub fn hash(args: HashArgs) -> Result<()> {
    let bytes = if args.hex {
        hex::decode(evmledger_core::hash::strip_hex_prefix(&args.message))
            .context("Message is not valid hex")?
    } else {
        args.message.into_bytes()
    };

    let digest = match args.tag {
        None => keccak256(&bytes),
        Some(Tag::Leaf) => hash_tagged(LEAF_TAG, &bytes),
        Some(Tag::Merkle) => hash_tagged(NODE_TAG, &bytes),
    };

    println!("{}", digest.to_string().bright_yellow());
    Ok(())
}

pub fn keygen(args: KeygenArgs) -> Result<()> {
    let keypair = match &args.private_key {
        Some(key) => Keypair::from_private_key_hex(key).context("Invalid private key")?,
        None => Keypair::generate(),
    };

    println!("{}", "Keypair:".bold().cyan());
    println!();
    println!("  Address:     {}", keypair.address().to_hex().bright_yellow());
    println!("  Public Key:  {}", keypair.public_key_hex().bright_black());
    println!("  Private Key: {}", keypair.private_key_hex().bright_black());

    if let Some(path) = args.out {
        let key_json = serde_json::json!({
            "address": keypair.address().to_hex(),
            "public_key": keypair.public_key_hex(),
            "private_key": keypair.private_key_hex(),
        });
        fs::write(&path, serde_json::to_string_pretty(&key_json)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        println!();
        println!(
            "{}  Saved to: {}",
            "✓".green().bold(),
            path.display().to_string().bright_black()
        );
    }

    Ok(())
}

pub fn sign(args: SignArgs) -> Result<()> {
    let signature = crypto::sign(args.message.as_bytes(), &args.key).context("Signing failed")?;

    println!("  r:         {}", signature.r_hex());
    println!("  s:         {}", signature.s_hex());
    println!("  v:         {}", signature.v);
    println!("  Signature: {}", signature.to_hex().bright_yellow());
    Ok(())
}

pub fn verify(args: VerifyArgs) -> Result<()> {
    if crypto::verify(args.message.as_bytes(), &args.signature, &args.public_key) {
        println!("{}  Signature is valid", "✓".green().bold());
        Ok(())
    } else {
        bail!("signature does not verify against the given public key")
    }
}

pub fn recover(args: RecoverArgs) -> Result<()> {
    match crypto::recover_address(args.message.as_bytes(), &args.signature) {
        Some(address) => {
            println!("{}", address.to_hex().bright_yellow());
            Ok(())
        }
        None => bail!("could not recover a signer from this signature"),
    }
}
