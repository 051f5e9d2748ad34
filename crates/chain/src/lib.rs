//! Ledger orchestration for evmledger.
//!
//! This crate wraps the core primitives into a usable ledger:
//! - **Blockchain**: append-only block sequence with link and validity checks
//! - **Config**: JSON-backed chain configuration
//! - **Logging**: `tracing` subscriber setup driven by the config
//!
//! # Example
//!
//! ```rust,no_run
//! use evmledger_chain::{init_logging, Blockchain, ChainConfig};
//! use evmledger_core::{Block, Keypair};
//!
//! let config = ChainConfig::load("config.json").unwrap();
//! init_logging(&config).unwrap();
//!
//! let validator = Keypair::generate();
//! let blockchain = Blockchain::new(config);
//! assert!(blockchain.add_block(Block::genesis(&validator)));
//! ```

pub mod blockchain;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use blockchain::{Blockchain, BlockchainStats, RejectReason};
pub use config::{ChainConfig, ConfigError};
pub use logging::init_logging;
