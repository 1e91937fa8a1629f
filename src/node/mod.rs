mod miner;

pub use miner::spawn_miner;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use crate::blockchain::{Block, BlockData, Blockchain};
use crate::clock::Clock;
use crate::error::{NodeError, TransactionError};
use crate::transaction::Transaction;
use crate::wallet::Wallet;

/// Owner of the local chain.
///
/// All mutations (local appends and replacements) go through the write lock;
/// readers always see a whole chain. Proof-of-work runs outside the lock and
/// can be cancelled.
pub struct Node {
    blockchain: RwLock<Blockchain>,
    mining: Mutex<Option<Arc<AtomicBool>>>,
    clock: Arc<dyn Clock>,
}

impl Node {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::from_blockchain(Blockchain::new(), clock)
    }

    /// Start from an existing local chain (trusted as-is).
    pub fn from_blockchain(blockchain: Blockchain, clock: Arc<dyn Clock>) -> Self {
        Self {
            blockchain: RwLock::new(blockchain),
            mining: Mutex::new(None),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.blockchain.read().expect("blockchain lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Blockchain> {
        self.blockchain.write().expect("blockchain lock poisoned")
    }

    /// Consistent copy of the current chain.
    pub fn snapshot(&self) -> Vec<Block> {
        self.read().chain.clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn last_block(&self) -> Block {
        self.read().last_block().clone()
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        Wallet::calculate_balance(&self.read().chain, address)
    }

    /// Create a transaction from `wallet`, refreshing its balance from the current chain.
    pub fn create_transaction(
        &self,
        wallet: &mut Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction, TransactionError> {
        let bc = self.read();
        wallet.create_transaction(recipient, amount, Some(bc.chain.as_slice()), self.clock.as_ref())
    }

    /// Mine `data` on top of the current tip and append it.
    ///
    /// Fails with `MineError::Cancelled` if another attempt or a chain
    /// replacement cancels this one, and with `StaleTip` if the tip moved
    /// while the puzzle was being solved.
    pub fn mine(&self, data: BlockData) -> Result<Block, NodeError> {
        let last = self.last_block();

        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut current = self.mining.lock().expect("mining lock poisoned");
            if let Some(previous) = current.replace(cancel.clone()) {
                previous.store(true, Ordering::SeqCst);
            }
        }

        debug!("MINER - mining on top of {}", last.hash);
        let mined = Block::mine_block_cancellable(&last, data, self.clock.as_ref(), &cancel);

        {
            let mut current = self.mining.lock().expect("mining lock poisoned");
            if current.as_ref().is_some_and(|flag| Arc::ptr_eq(flag, &cancel)) {
                *current = None;
            }
        }
        let block = mined?;

        let mut bc = self.write();
        if bc.last_block().hash != last.hash {
            return Err(NodeError::StaleTip {
                expected: last.hash,
            });
        }
        bc.chain.push(block.clone());
        info!(
            "MINER - sealed block #{} (hash={}, nonce={}, difficulty={})",
            bc.len() - 1,
            block.hash,
            block.nonce,
            block.difficulty
        );
        Ok(block)
    }

    /// Pending transactions that can go into the next block on the current tip.
    ///
    /// A transaction is kept if it is valid on its own, its input amount is the
    /// signer's balance on the current chain, and no earlier transaction in
    /// `pending` from the same signer was already kept.
    pub fn select_transactions(&self, pending: &[Transaction]) -> Vec<Transaction> {
        let bc = self.read();
        let mut signers = HashSet::new();
        let mut selected = Vec::new();

        for tx in pending {
            if !tx.is_valid() {
                continue;
            }
            let balance = Wallet::calculate_balance(&bc.chain, &tx.input.address);
            if tx.input.amount != balance {
                debug!(
                    "MINER - skipping {}: input amount {} != balance {}",
                    tx.id, tx.input.amount, balance
                );
                continue;
            }
            if !signers.insert(tx.input.address.clone()) {
                debug!(
                    "MINER - skipping {}: signer {} already has a transaction in this block",
                    tx.id, tx.input.address
                );
                continue;
            }
            selected.push(tx.clone());
        }
        selected
    }

    /// Mine the selectable subset of `pending` plus one reward for `miner`.
    pub fn mine_transactions(
        &self,
        pending: &[Transaction],
        miner: &Wallet,
    ) -> Result<Block, NodeError> {
        let mut txs = self.select_transactions(pending);
        debug!(
            "MINER - selected {} of {} pending transactions",
            txs.len(),
            pending.len()
        );
        txs.push(Transaction::reward(miner));
        self.mine(txs.into())
    }

    /// Fork choice: adopt `chain` if it is strictly longer and valid.
    /// Any in-flight mining attempt is cancelled before the lock is released,
    /// then `on_replace` runs.
    pub fn replace_chain<F>(
        &self,
        chain: Vec<Block>,
        validate_transactions: bool,
        on_replace: F,
    ) -> Result<(), NodeError>
    where
        F: FnOnce(),
    {
        let mut bc = self.write();
        bc.replace_chain(chain, validate_transactions, || {})?;
        // Only attempts on the old tip can be registered while the lock is held.
        self.cancel_mining();
        drop(bc);
        on_replace();
        Ok(())
    }

    /// Abort the in-flight mining attempt, if any.
    pub fn cancel_mining(&self) {
        let current = self.mining.lock().expect("mining lock poisoned");
        if let Some(flag) = current.as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}
