//! End-to-end demo: sign transfers, seal a block, append it to a ledger.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use evmledger_chain::{Blockchain, ChainConfig};
use evmledger_core::{units, Block, Hash, Keypair, Transaction};
use tracing::info;

#[derive(Args)]
pub struct DemoArgs {
    /// Gas price as a decimal amount
    #[arg(short, long, default_value = "0.000000001")]
    gas_price: String,

    /// Flip one byte of the last transaction's signature before sealing
    #[arg(long)]
    corrupt: bool,

    /// Print the sealed block as JSON
    #[arg(long)]
    json: bool,
}

fn transfer(from: &Keypair, to: &Keypair, amount: &str, gas_price: &str) -> Result<Transaction> {
    let tx = Transaction::new(
        &from.address().to_hex(),
        &to.address().to_hex(),
        amount,
        0,
        None,
        gas_price,
    )
    .with_context(|| format!("Failed to build transfer of {amount}"))?;
    Ok(tx.signed(from))
}

fn corrupt_signature(tx: Transaction) -> Result<Transaction> {
    let signature = tx.signature().context("Transaction is not signed")?;
    let mut bytes = hex::decode(&signature[2..])?;
    bytes[40] ^= 0x01;
    Ok(tx.with_signature(format!("0x{}", hex::encode(bytes))))
}

pub fn run(args: DemoArgs, config: &ChainConfig) -> Result<()> {
    let alice = Keypair::generate();
    let bob = Keypair::generate();
    let carol = Keypair::generate();
    let validator = Keypair::generate();

    let mut txs = vec![
        transfer(&alice, &bob, "1.5", &args.gas_price)?,
        transfer(&bob, &carol, "0.25", &args.gas_price)?,
        transfer(&carol, &alice, "10.0", &args.gas_price)?,
    ];
    if args.corrupt {
        let last = txs.pop().context("No transactions")?;
        txs.push(corrupt_signature(last)?);
    }

    println!("{}", "Transactions:".bold().cyan());
    for tx in &txs {
        let status = if tx.is_valid() {
            "valid".green()
        } else {
            "invalid".red()
        };
        println!(
            "  {} {} -> {}  {} units  fee {}  [{}]",
            tx.hash().to_string().bright_black(),
            tx.from(),
            tx.to(),
            units::format_base_units(tx.amount()),
            units::format_base_units(tx.fee()),
            status
        );
    }

    let blockchain = Blockchain::new(config.clone());
    let block = Block::new(Hash::ZERO, txs, &validator);
    info!(block = %block.hash(), txs = block.tx_count(), "sealed demo block");

    println!();
    println!("{}", "Block:".bold().cyan());
    println!("  Hash:        {}", block.hash().to_string().bright_yellow());
    println!("  Merkle root: {}", block.to_view().merkle_root);
    println!("  Validator:   {}", block.validator());
    println!("  Gas used:    {}", block.total_gas_used());
    println!(
        "  Fees:        {} ({} base units)",
        units::format_base_units(block.total_fees_collected()),
        block.total_fees_collected()
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&block.to_view())?);
    }

    println!();
    match blockchain.try_add_block(block) {
        Ok(index) => println!("{}  Block appended at index {}", "✓".green().bold(), index),
        Err(reason) => println!("{}  Block rejected: {}", "✗".red().bold(), reason),
    }

    let stats = blockchain.stats();
    println!(
        "  Chain {}: height {}, {} transactions, valid: {}",
        stats.chain_id,
        stats.height,
        stats.total_transactions,
        blockchain.is_valid()
    );
    Ok(())
}
