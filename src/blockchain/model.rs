use std::collections::HashSet;

use log::{error, info};

use super::{Block, BlockData, MINING_REWARD};
use crate::clock::Clock;
use crate::error::ChainError;
use crate::wallet::Wallet;

/// In-memory chain of blocks, always starting with the genesis block.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Mine and append a new block carrying `data`. The local tip is trusted,
    /// so nothing is re-validated here.
    pub fn add_block(&mut self, data: BlockData, clock: &dyn Clock) -> &Block {
        let block = Block::mine_block(self.last_block(), data, clock);
        self.chain.push(block);
        self.last_block()
    }

    /// Structural check of any candidate chain: genesis, linkage, hashes,
    /// proof-of-work and difficulty steps. Transaction content is not inspected.
    pub fn is_valid_chain(chain: &[Block]) -> bool {
        match chain.first() {
            Some(first) if *first == Block::genesis() => {}
            _ => return false,
        }

        for pair in chain.windows(2) {
            let (prev, current) = (&pair[0], &pair[1]);

            if current.last_hash != prev.hash {
                return false;
            }

            if current.hash != current.compute_hash() {
                return false;
            }

            if !current.meets_difficulty() {
                return false;
            }

            if prev.difficulty.abs_diff(current.difficulty) > 1 {
                return false;
            }
        }

        true
    }

    /// Replace the local chain with a strictly longer, valid `chain`.
    ///
    /// With `validate_transactions` the economic content is checked as well.
    /// `on_replace` runs exactly once, after the swap; on error the local chain
    /// is untouched and `on_replace` never runs.
    pub fn replace_chain<F>(
        &mut self,
        chain: Vec<Block>,
        validate_transactions: bool,
        on_replace: F,
    ) -> Result<(), ChainError>
    where
        F: FnOnce(),
    {
        if chain.len() <= self.chain.len() {
            error!("The incoming chain must be longer");
            return Err(ChainError::NotLonger {
                incoming: chain.len(),
                current: self.chain.len(),
            });
        }

        if !Self::is_valid_chain(&chain) {
            error!("The incoming chain must be valid");
            return Err(ChainError::InvalidChain);
        }

        if validate_transactions && !Self::valid_transaction_data(&chain) {
            error!("The incoming chain has invalid transaction data");
            return Err(ChainError::InvalidTransactionData);
        }

        info!(
            "Replacing chain ({} blocks) with incoming chain ({} blocks)",
            self.chain.len(),
            chain.len()
        );
        self.chain = chain;
        on_replace();
        Ok(())
    }

    /// Ledger-wide check of every non-genesis block's transactions:
    /// at most one correctly sized reward per block, no signer or transaction
    /// twice in one block, every transfer valid on its own and claiming exactly
    /// the balance the chain before its block gives the signer.
    pub fn valid_transaction_data(chain: &[Block]) -> bool {
        for (i, block) in chain.iter().enumerate().skip(1) {
            let Some(txs) = block.data.transactions() else {
                error!("Block {} carries no transaction list", block.hash);
                return false;
            };

            let mut reward_count = 0usize;
            let mut seen_ids: HashSet<&str> = HashSet::new();
            let mut seen_signers: HashSet<&str> = HashSet::new();

            for tx in txs {
                if !seen_ids.insert(tx.id.as_str()) {
                    error!("Transaction {} appears more than once in a block", tx.id);
                    return false;
                }

                if tx.is_reward() {
                    reward_count += 1;
                    if reward_count > 1 {
                        error!("Miner rewards exceed limit in block {}", block.hash);
                        return false;
                    }

                    let amounts: Vec<u64> = tx.output_map.values().copied().collect();
                    if amounts != [MINING_REWARD] {
                        error!("Miner reward amount is invalid in transaction {}", tx.id);
                        return false;
                    }
                    continue;
                }

                if !tx.is_valid() {
                    error!("Invalid transaction {}", tx.id);
                    return false;
                }

                let true_balance = Wallet::calculate_balance(&chain[..i], &tx.input.address);
                if tx.input.amount != true_balance {
                    error!(
                        "Invalid input amount in transaction {} (claimed={}, actual={})",
                        tx.id, tx.input.amount, true_balance
                    );
                    return false;
                }

                if !seen_signers.insert(tx.input.address.as_str()) {
                    error!(
                        "Signer {} appears more than once in block {}",
                        tx.input.address, block.hash
                    );
                    return false;
                }
            }
        }

        true
    }
}
