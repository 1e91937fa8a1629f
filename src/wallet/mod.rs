use log::debug;
use secp256k1::SecretKey;
use serde::Serialize;

use crate::blockchain::{Block, STARTING_BALANCE};
use crate::clock::Clock;
use crate::crypto::{generate_keypair, sign};
use crate::error::TransactionError;
use crate::transaction::Transaction;

/// A secp256k1 keypair plus a cached balance.
///
/// The balance is a projection of chain history; `create_transaction` refreshes
/// it when given a chain.
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    /// Hex of the compressed public key. Also the wallet's address.
    pub public_key: String,
    pub balance: u64,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        let (secret_key, public_key) = generate_keypair();
        Self {
            secret_key,
            public_key,
            balance: STARTING_BALANCE,
        }
    }

    /// Sign the canonical hash of `data` (hex DER).
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> String {
        sign(&self.secret_key, data)
    }

    /// Build a signed transfer. If `chain` is given the cached balance is
    /// recomputed from it first.
    pub fn create_transaction(
        &mut self,
        recipient: &str,
        amount: u64,
        chain: Option<&[Block]>,
        clock: &dyn Clock,
    ) -> Result<Transaction, TransactionError> {
        if let Some(chain) = chain {
            self.balance = Self::calculate_balance(chain, &self.public_key);
        }
        Transaction::new(self, recipient, amount, clock)
    }

    /// Spendable balance of `address` according to `chain`.
    ///
    /// Walks backward from the tip. The first block (from the tip) in which the
    /// address signed a transaction ends the walk: that block's outputs to the
    /// address, plus everything received after it, is the balance. If the
    /// address never signed anything, the starting balance is added to all
    /// receipts.
    pub fn calculate_balance(chain: &[Block], address: &str) -> u64 {
        let mut has_conducted_transaction = false;
        let mut outputs_total: u64 = 0;

        for block in chain.iter().skip(1).rev() {
            let Some(txs) = block.data.transactions() else {
                continue;
            };

            for tx in txs {
                if tx.input.address == address {
                    has_conducted_transaction = true;
                }
                if let Some(amount) = tx.output_map.get(address) {
                    outputs_total = outputs_total.saturating_add(*amount);
                }
            }

            if has_conducted_transaction {
                break;
            }
        }

        let balance = if has_conducted_transaction {
            outputs_total
        } else {
            STARTING_BALANCE.saturating_add(outputs_total)
        };
        debug!("balance of {} = {} (spent={})", address, balance, has_conducted_transaction);
        balance
    }
}
