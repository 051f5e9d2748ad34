//! Block and block header structures.

use crate::crypto::{self, Address, Keypair};
use crate::hash::{hash_canonical_json, Hash};
use crate::merkle::{encode_node, merkle_root, MerkleItem};
use crate::transaction::{Transaction, TransactionValidationError, TransactionView};
use crate::units;
use num_bigint::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Upper bound (inclusive) of the random block nonce.
pub const MAX_BLOCK_NONCE: u64 = 1000;

/// Why a block failed validation. Checks run in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockValidationError {
    #[error("previous hash mismatch: expected {expected}, found {found}")]
    PreviousHashMismatch { expected: Hash, found: Hash },
    #[error("merkle root mismatch: stored {stored}, computed {computed}")]
    MerkleRootMismatch { stored: Hash, computed: Hash },
    #[error("block hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: Hash, computed: Hash },
    #[error("transaction {index} is invalid: {reason}")]
    InvalidTransaction {
        index: usize,
        reason: TransactionValidationError,
    },
    #[error("validator signature does not recover to {validator}")]
    InvalidValidatorSignature { validator: Address },
}

/// The hashed fields of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Hash of the previous block.
    pub previous_hash: Hash,
    /// Merkle root of transaction hashes.
    pub merkle_root: Hash,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Tie-breaker, not proof of work.
    pub nonce: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeaderPayload {
    previous_hash: Hash,
    merkle_root: String,
    timestamp: u64,
    nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    validator_address: Option<Address>,
}

impl BlockHeader {
    fn payload(&self, validator: Option<Address>) -> HeaderPayload {
        HeaderPayload {
            previous_hash: self.previous_hash,
            merkle_root: encode_node(&self.merkle_root),
            timestamp: self.timestamp,
            nonce: self.nonce,
            validator_address: validator,
        }
    }

    /// Calculate the hash of this block header.
    pub fn hash(&self) -> Hash {
        hash_canonical_json(&self.payload(None)).expect("serialization should not fail")
    }

    /// The message the validator signs: the header plus the validator address.
    pub fn signing_payload(&self, validator: Address) -> String {
        serde_json::to_string(&self.payload(Some(validator))).expect("serialization should not fail")
    }

    /// Get the current Unix timestamp.
    pub fn current_timestamp() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
    }
}

/// A complete block: header, transactions, derived totals and the validator
/// signature.
///
/// Totals count only transactions that pass [`Transaction::is_valid`];
/// invalid ones stay in the list but make [`Block::is_valid`] fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    total_gas_used: u128,
    total_fees_collected: BigUint,
    hash: Hash,
    validator: Address,
    validator_signature: String,
}

/// Flat, serializable view of a block with transactions nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub hash: Hash,
    pub previous_hash: Hash,
    pub merkle_root: String,
    pub timestamp: u64,
    pub nonce: u64,
    pub transaction_count: usize,
    pub total_gas_used: String,
    pub total_fees_collected: String,
    pub total_fees_decimal: String,
    pub validator_address: Address,
    pub validator_signature: String,
    pub transactions: Vec<TransactionView>,
}

fn transactions_root(transactions: &[Transaction]) -> Hash {
    let items: Vec<MerkleItem> = transactions.iter().map(|tx| MerkleItem::Hashed(tx.hash())).collect();
    merkle_root(&items)
}

impl Block {
    /// Create and sign a block stamped with the current time and a random nonce.
    pub fn new(previous_hash: Hash, transactions: Vec<Transaction>, validator: &Keypair) -> Self {
        let nonce = rand::thread_rng().gen_range(0..=MAX_BLOCK_NONCE);
        Self::with_header(
            previous_hash,
            transactions,
            BlockHeader::current_timestamp(),
            nonce,
            validator,
        )
    }

    /// Create and sign a block with explicit timestamp and nonce.
    pub fn with_header(
        previous_hash: Hash,
        transactions: Vec<Transaction>,
        timestamp: u64,
        nonce: u64,
        validator: &Keypair,
    ) -> Self {
        let header = BlockHeader {
            previous_hash,
            merkle_root: transactions_root(&transactions),
            timestamp,
            nonce,
        };

        let (total_gas_used, total_fees_collected) = transactions
            .iter()
            .filter(|tx| tx.is_valid())
            .fold((0u128, BigUint::default()), |(gas, fees), tx| {
                (gas + u128::from(tx.gas_limit()), fees + tx.fee())
            });

        let validator_address = validator.address();
        let validator_signature = validator
            .sign(header.signing_payload(validator_address).as_bytes())
            .to_hex();

        Self {
            hash: header.hash(),
            header,
            transactions,
            total_gas_used,
            total_fees_collected,
            validator: validator_address,
            validator_signature,
        }
    }

    /// Create an empty block over the zero predecessor hash.
    pub fn genesis(validator: &Keypair) -> Self {
        Self::new(Hash::ZERO, Vec::new(), validator)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Get the block hash (hash of the header).
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn previous_hash(&self) -> Hash {
        self.header.previous_hash
    }

    pub fn merkle_root(&self) -> Hash {
        self.header.merkle_root
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Gas used by the valid transactions.
    ///
    /// Widened to `u128` so that any number of `u64` gas limits sums exactly.
    pub fn total_gas_used(&self) -> u128 {
        self.total_gas_used
    }

    /// Fees (base units) paid by the valid transactions.
    pub fn total_fees_collected(&self) -> &BigUint {
        &self.total_fees_collected
    }

    pub fn validator(&self) -> Address {
        self.validator
    }

    pub fn validator_signature(&self) -> &str {
        &self.validator_signature
    }

    /// Check if this block sits on the zero predecessor.
    pub fn is_genesis(&self) -> bool {
        self.header.previous_hash.is_zero()
    }

    /// Verify the merkle root matches the transactions.
    pub fn verify_merkle_root(&self) -> bool {
        transactions_root(&self.transactions) == self.header.merkle_root
    }

    /// Recover the validator address from the stored signature.
    pub fn recover_validator(&self) -> Option<Address> {
        crypto::recover_address(
            self.header.signing_payload(self.validator).as_bytes(),
            &self.validator_signature,
        )
    }

    /// Re-derive every field and return the first failing check.
    pub fn validate(&self, expected_previous_hash: &Hash) -> Result<(), BlockValidationError> {
        let result = self.run_checks(expected_previous_hash);
        if let Err(err) = &result {
            debug!(block = %self.hash, error = %err, "block failed validation");
        }
        result
    }

    fn run_checks(&self, expected_previous_hash: &Hash) -> Result<(), BlockValidationError> {
        if self.header.previous_hash != *expected_previous_hash {
            return Err(BlockValidationError::PreviousHashMismatch {
                expected: *expected_previous_hash,
                found: self.header.previous_hash,
            });
        }

        let computed_root = transactions_root(&self.transactions);
        if computed_root != self.header.merkle_root {
            return Err(BlockValidationError::MerkleRootMismatch {
                stored: self.header.merkle_root,
                computed: computed_root,
            });
        }

        let computed_hash = self.header.hash();
        if computed_hash != self.hash {
            return Err(BlockValidationError::HashMismatch {
                stored: self.hash,
                computed: computed_hash,
            });
        }

        for (index, tx) in self.transactions.iter().enumerate() {
            tx.validate()
                .map_err(|reason| BlockValidationError::InvalidTransaction { index, reason })?;
        }

        if self.recover_validator() != Some(self.validator) {
            return Err(BlockValidationError::InvalidValidatorSignature {
                validator: self.validator,
            });
        }

        Ok(())
    }

    /// Check the block against the hash its predecessor is expected to have.
    pub fn is_valid(&self, expected_previous_hash: &Hash) -> bool {
        self.validate(expected_previous_hash).is_ok()
    }

    pub fn to_view(&self) -> BlockView {
        BlockView {
            hash: self.hash,
            previous_hash: self.header.previous_hash,
            merkle_root: encode_node(&self.header.merkle_root),
            timestamp: self.header.timestamp,
            nonce: self.header.nonce,
            transaction_count: self.transactions.len(),
            total_gas_used: self.total_gas_used.to_string(),
            total_fees_collected: self.total_fees_collected.to_string(),
            total_fees_decimal: units::format_base_units(&self.total_fees_collected),
            validator_address: self.validator,
            validator_signature: self.validator_signature.clone(),
            transactions: self.transactions.iter().map(Transaction::to_view).collect(),
        }
    }
}
