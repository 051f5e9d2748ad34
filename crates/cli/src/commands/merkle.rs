//! Merkle tree command.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use evmledger_core::merkle::{encode_node, leaf_hash, verify_proof, Direction, MerkleItem, MerkleTree};

#[derive(Args)]
pub struct MerkleArgs {
    /// Items to commit to, in order
    #[arg(required = true)]
    items: Vec<String>,

    /// Parse each item as JSON instead of raw text
    #[arg(long)]
    json: bool,

    /// Print the inclusion proof for this leaf index
    #[arg(short, long)]
    proof: Option<usize>,
}

pub fn run(args: MerkleArgs) -> Result<()> {
    let items = args
        .items
        .iter()
        .map(|item| {
            if args.json {
                serde_json::from_str(item)
                    .map(MerkleItem::Json)
                    .with_context(|| format!("Item is not valid JSON: {item}"))
            } else {
                Ok(MerkleItem::Text(item.clone()))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let tree = MerkleTree::build(&items);
    println!("  Leaves: {}", tree.leaf_count());
    println!("  Depth:  {}", tree.depth());
    println!("  Root:   {}", encode_node(&tree.root()).bright_yellow());

    let Some(index) = args.proof else {
        return Ok(());
    };
    let Some(proof) = tree.proof(index) else {
        bail!("leaf index {} out of range (tree has {} leaves)", index, tree.leaf_count());
    };

    println!();
    println!("{}", format!("Proof for leaf {index}:").bold().cyan());
    for step in &proof {
        let side = match step.direction {
            Direction::Left => "left ",
            Direction::Right => "right",
        };
        println!("  {} {}", side, step.sibling.to_string().bright_black());
    }

    let leaf = leaf_hash(&items[index]);
    if verify_proof(&leaf, &proof, &tree.root()) {
        println!("{}  Proof verifies", "✓".green().bold());
    } else {
        bail!("proof failed to verify");
    }
    Ok(())
}
