//! Main blockchain ledger.
//!
//! An ordered, append-only list of blocks indexed by position and by hash.
//! Appends are serialized by a write lock held across the latest-block read
//! and the push; reads share the lock.

use crate::config::ChainConfig;
use evmledger_core::{Block, BlockValidationError, Hash};
use num_bigint::BigUint;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a block was not appended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("block carries {count} transactions, limit is {limit}")]
    TooManyTransactions { count: usize, limit: usize },

    #[error("previous hash {found} does not match latest block {expected}")]
    LinkMismatch { expected: Hash, found: Hash },

    #[error("block already in chain: {0}")]
    Duplicate(Hash),

    #[error("invalid block: {0}")]
    Invalid(#[from] BlockValidationError),
}

pub type Result<T> = std::result::Result<T, RejectReason>;

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<Block>,
    by_hash: HashMap<Hash, usize>,
}

/// Main blockchain struct.
#[derive(Debug)]
pub struct Blockchain {
    state: RwLock<ChainState>,
    config: ChainConfig,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl Blockchain {
    /// Create an empty ledger.
    pub fn new(config: ChainConfig) -> Self {
        Self {
            state: RwLock::new(ChainState::default()),
            config,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Validate and append a block, returning its index.
    ///
    /// A rejected block leaves the ledger untouched.
    pub fn try_add_block(&self, block: Block) -> Result<usize> {
        let mut state = self.state.write();

        let result = self.check_append(&state, &block);
        if let Err(reason) = &result {
            warn!(block = %block.hash(), height = state.blocks.len(), %reason, "block rejected");
            return Err(reason.clone());
        }

        let index = state.blocks.len();
        let hash = block.hash();
        state.by_hash.insert(hash, index);
        state.blocks.push(block);
        info!(block = %hash, index, "block added");
        Ok(index)
    }

    fn check_append(&self, state: &ChainState, block: &Block) -> Result<()> {
        let limit = self.config.max_transactions_per_block;
        if block.tx_count() > limit {
            return Err(RejectReason::TooManyTransactions {
                count: block.tx_count(),
                limit,
            });
        }

        if state.by_hash.contains_key(&block.hash()) {
            return Err(RejectReason::Duplicate(block.hash()));
        }

        // Genesis has no predecessor to link to.
        let expected = match state.blocks.last() {
            Some(latest) => {
                if block.previous_hash() != latest.hash() {
                    return Err(RejectReason::LinkMismatch {
                        expected: latest.hash(),
                        found: block.previous_hash(),
                    });
                }
                latest.hash()
            }
            None => block.previous_hash(),
        };

        block.validate(&expected)?;
        Ok(())
    }

    /// Append a block if it links to the latest block and is valid.
    pub fn add_block(&self, block: Block) -> bool {
        self.try_add_block(block).is_ok()
    }

    /// Re-check every block and every link.
    pub fn is_valid(&self) -> bool {
        let state = self.state.read();
        let Some(genesis) = state.blocks.first() else {
            return true;
        };
        if !genesis.is_valid(&genesis.previous_hash()) {
            debug!(block = %genesis.hash(), "genesis block failed validation");
            return false;
        }

        state.blocks.windows(2).enumerate().all(|(i, pair)| {
            let (prev, curr) = (&pair[0], &pair[1]);
            if curr.previous_hash() != prev.hash() {
                debug!(index = i + 1, "chain link broken");
                return false;
            }
            curr.is_valid(&prev.hash())
        })
    }

    /// Get a block by position.
    pub fn get_block(&self, index: usize) -> Option<Block> {
        self.state.read().blocks.get(index).cloned()
    }

    /// Get a block by hash.
    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<Block> {
        let state = self.state.read();
        state.by_hash.get(hash).map(|&i| state.blocks[i].clone())
    }

    /// Get the latest block.
    pub fn get_latest_block(&self) -> Option<Block> {
        self.state.read().blocks.last().cloned()
    }

    /// Number of blocks in the ledger.
    pub fn height(&self) -> usize {
        self.state.read().blocks.len()
    }

    /// Snapshot of every block in order.
    pub fn blocks(&self) -> Vec<Block> {
        self.state.read().blocks.clone()
    }

    /// Get blockchain statistics.
    pub fn stats(&self) -> BlockchainStats {
        let state = self.state.read();
        BlockchainStats {
            chain_id: self.config.chain_id,
            height: state.blocks.len(),
            latest_block_hash: state.blocks.last().map(Block::hash),
            total_transactions: state.blocks.iter().map(Block::tx_count).sum(),
            total_fees: state
                .blocks
                .iter()
                .fold(BigUint::default(), |acc, b| acc + b.total_fees_collected()),
        }
    }
}

/// Blockchain statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockchainStats {
    pub chain_id: u64,
    /// Number of blocks.
    pub height: usize,
    /// Hash of the latest block.
    pub latest_block_hash: Option<Hash>,
    pub total_transactions: usize,
    /// Sum of collected fees, base units.
    pub total_fees: BigUint,
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmledger_core::{Keypair, Transaction};

    const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";

    fn transfer(keypair: &Keypair, nonce: u64) -> Transaction {
        Transaction::new(&keypair.address().to_hex(), RECIPIENT, "1", nonce, None, "0.000000001")
            .unwrap()
            .signed(keypair)
    }

    fn setup_blockchain() -> (Blockchain, Keypair) {
        let validator = Keypair::generate();
        let blockchain = Blockchain::new(ChainConfig::default());
        assert!(blockchain.add_block(Block::genesis(&validator)));
        (blockchain, validator)
    }

    #[test]
    fn test_empty_chain() {
        let blockchain = Blockchain::default();
        assert_eq!(blockchain.height(), 0);
        assert!(blockchain.get_latest_block().is_none());
        assert!(blockchain.get_block(0).is_none());
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_blockchain_init() {
        let (blockchain, _) = setup_blockchain();

        assert_eq!(blockchain.height(), 1);
        let genesis = blockchain.get_latest_block().unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(blockchain.get_block_by_hash(&genesis.hash()), Some(genesis));
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_append_linked_block() {
        let (blockchain, validator) = setup_blockchain();
        let latest = blockchain.get_latest_block().unwrap();
        let block = Block::new(latest.hash(), vec![transfer(&validator, 0)], &validator);
        let hash = block.hash();

        assert_eq!(blockchain.try_add_block(block), Ok(1));
        assert_eq!(blockchain.height(), 2);
        assert_eq!(blockchain.get_block(1).unwrap().hash(), hash);
        assert!(blockchain.is_valid());
    }

    #[test]
    fn test_reject_unlinked_block() {
        let (blockchain, validator) = setup_blockchain();
        let latest = blockchain.get_latest_block().unwrap();
        let stray = Block::new(Hash::ZERO, vec![], &validator);

        assert_eq!(
            blockchain.try_add_block(stray),
            Err(RejectReason::LinkMismatch {
                expected: latest.hash(),
                found: Hash::ZERO,
            })
        );
        assert_eq!(blockchain.height(), 1);
    }

    #[test]
    fn test_reject_duplicate_block() {
        let validator = Keypair::generate();
        let blockchain = Blockchain::default();
        let genesis = Block::genesis(&validator);

        assert!(blockchain.add_block(genesis.clone()));
        assert_eq!(
            blockchain.try_add_block(genesis.clone()),
            Err(RejectReason::Duplicate(genesis.hash()))
        );
    }

    #[test]
    fn test_reject_oversized_block() {
        let config = ChainConfig {
            max_transactions_per_block: 1,
            ..ChainConfig::default()
        };
        let blockchain = Blockchain::new(config);
        let validator = Keypair::generate();
        let block = Block::new(
            Hash::ZERO,
            vec![transfer(&validator, 0), transfer(&validator, 1)],
            &validator,
        );

        assert_eq!(
            blockchain.try_add_block(block),
            Err(RejectReason::TooManyTransactions { count: 2, limit: 1 })
        );
        assert_eq!(blockchain.height(), 0);
    }

    #[test]
    fn test_reject_invalid_block() {
        let (blockchain, validator) = setup_blockchain();
        let latest = blockchain.get_latest_block().unwrap();
        let unsigned = Transaction::new(&validator.address().to_hex(), RECIPIENT, "1", 0, None, "0.000000001")
            .unwrap();
        let block = Block::new(latest.hash(), vec![unsigned], &validator);

        assert!(matches!(
            blockchain.try_add_block(block),
            Err(RejectReason::Invalid(BlockValidationError::InvalidTransaction { index: 0, .. }))
        ));
        assert_eq!(blockchain.height(), 1);
    }

    #[test]
    fn test_blockchain_stats() {
        let (blockchain, validator) = setup_blockchain();
        let latest = blockchain.get_latest_block().unwrap();
        let tx = transfer(&validator, 0);
        let fee = tx.fee().clone();
        assert!(blockchain.add_block(Block::new(latest.hash(), vec![tx], &validator)));

        let stats = blockchain.stats();
        assert_eq!(stats.chain_id, 1);
        assert_eq!(stats.height, 2);
        assert_eq!(stats.total_transactions, 1);
        assert_eq!(stats.total_fees, fee);
        assert_eq!(stats.latest_block_hash, blockchain.get_latest_block().map(|b| b.hash()));
        assert_eq!(blockchain.blocks().len(), 2);
    }

    #[test]
    fn test_concurrent_appends_keep_single_successor() {
        use std::sync::Arc;
        use std::thread;

        let (blockchain, validator) = setup_blockchain();
        let blockchain = Arc::new(blockchain);
        let parent = blockchain.get_latest_block().unwrap().hash();

        let handles: Vec<_> = (0..8u64)
            .map(|nonce| {
                let chain = Arc::clone(&blockchain);
                let block = Block::with_header(parent, vec![], 1_700_000_000, nonce, &validator);
                thread::spawn(move || chain.add_block(block))
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(blockchain.height(), 2);
        assert!(blockchain.is_valid());
    }
}
