//! Unit conversion command.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use evmledger_core::units;
use std::cmp::Ordering;

#[derive(Args)]
pub struct UnitsArgs {
    #[command(subcommand)]
    command: UnitsCommand,
}

#[derive(Subcommand)]
enum UnitsCommand {
    /// Decimal amount to base units
    ToBase {
        /// Decimal amount (e.g. 1.5)
        amount: String,
    },
    /// Base units to a decimal amount
    FromBase {
        /// Base-unit integer
        value: String,
    },
    /// Add two base-unit amounts
    Add { a: String, b: String },
    /// Subtract b from a (base units)
    Sub { a: String, b: String },
    /// Multiply two amounts (decimal or base units)
    Mul { a: String, b: String },
    /// Divide two base-unit amounts
    Div {
        a: String,
        b: String,

        /// Fractional digits to keep
        #[arg(short, long, default_value_t = units::BASE_DECIMALS)]
        scale: u32,
    },
    /// Compare two base-unit amounts
    Compare { a: String, b: String },
}

pub fn run(args: UnitsArgs) -> Result<()> {
    let output = match args.command {
        UnitsCommand::ToBase { amount } => units::to_base_unit(&amount)?,
        UnitsCommand::FromBase { value } => units::from_base_unit(&value)?,
        UnitsCommand::Add { a, b } => units::add(&a, &b)?,
        UnitsCommand::Sub { a, b } => units::subtract(&a, &b)?,
        UnitsCommand::Mul { a, b } => units::multiply(&a, &b)?,
        UnitsCommand::Div { a, b, scale } => units::divide(&a, &b, scale)?,
        UnitsCommand::Compare { a, b } => match units::compare(&a, &b)? {
            Ordering::Less => "<".to_string(),
            Ordering::Equal => "=".to_string(),
            Ordering::Greater => ">".to_string(),
        },
    };

    println!("{}", output.bright_yellow());
    Ok(())
}
