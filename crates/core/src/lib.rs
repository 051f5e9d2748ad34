//! Core ledger primitives for evmledger.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Fixed-point unit arithmetic (18-decimal base units)
//! - Keccak-256 hashing with domain tags
//! - Merkle trees (dense and sparse)
//! - secp256k1 signatures and address recovery
//! - Transactions and blocks

pub mod block;
pub mod crypto;
pub mod curve;
pub mod hash;
pub mod merkle;
pub mod transaction;
pub mod units;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockHeader, BlockValidationError, BlockView};
pub use crypto::{Address, CryptoError, EcdsaSignature, Keypair, PublicKey};
pub use hash::{keccak256, Hash, H256};
pub use merkle::{merkle_root, verify_proof, Direction, MerkleItem, MerkleTree, ProofStep, SparseMerkleTree};
pub use transaction::{
    RawTransaction, Transaction, TransactionError, TransactionValidationError, TransactionView,
};
pub use units::UnitError;
