use std::collections::BTreeMap;

use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blockchain::{MINING_REWARD, REWARD_INPUT_ADDRESS};
use crate::clock::Clock;
use crate::crypto::verify_signature;
use crate::error::TransactionError;
use crate::wallet::Wallet;

/// Recipient address -> amount. Ordered, so it serialises (and hashes) deterministically.
pub type OutputMap = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub timestamp: i64,
    /// Sender balance at signing time; equals the sum of the output map.
    pub amount: u64,
    /// Sender public key (hex, compressed).
    pub address: String,
    /// Hex DER signature over the output map.
    pub signature: String,
}

impl TxInput {
    /// Sign `output_map` with the sender's key.
    fn signed(sender: &Wallet, output_map: &OutputMap, clock: &dyn Clock) -> Self {
        Self {
            timestamp: clock.now_millis(),
            amount: sender.balance,
            address: sender.public_key.clone(),
            signature: sender.sign(output_map),
        }
    }

    /// The fixed input carried by every reward transaction. It is not bound to
    /// any wallet and its signature is never checked.
    pub fn reward() -> Self {
        Self {
            timestamp: 0,
            amount: 0,
            address: REWARD_INPUT_ADDRESS.to_string(),
            signature: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub input: TxInput,
    pub output_map: OutputMap,
}

impl Transaction {
    /// Transfer `amount` from `sender` to `recipient`, returning the change to the sender.
    pub fn new(
        sender: &Wallet,
        recipient: &str,
        amount: u64,
        clock: &dyn Clock,
    ) -> Result<Self, TransactionError> {
        if amount > sender.balance {
            return Err(TransactionError::InsufficientBalance {
                amount,
                balance: sender.balance,
            });
        }

        let mut output_map = OutputMap::new();
        output_map.insert(sender.public_key.clone(), sender.balance - amount);
        *output_map.entry(recipient.to_string()).or_insert(0) += amount;

        let input = TxInput::signed(sender, &output_map, clock);
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            input,
            output_map,
        })
    }

    /// Reward for the miner of a block.
    pub fn reward(miner: &Wallet) -> Self {
        let mut output_map = OutputMap::new();
        output_map.insert(miner.public_key.clone(), MINING_REWARD);
        Self {
            id: Uuid::new_v4().to_string(),
            input: TxInput::reward(),
            output_map,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.input == TxInput::reward()
    }

    /// Move a further `amount` to `recipient` out of the sender's remaining
    /// change, then re-sign. Nothing changes on error.
    pub fn update(
        &mut self,
        sender: &Wallet,
        recipient: &str,
        amount: u64,
        clock: &dyn Clock,
    ) -> Result<(), TransactionError> {
        let remaining = self
            .output_map
            .get(&sender.public_key)
            .copied()
            .unwrap_or(0);
        if amount > remaining {
            return Err(TransactionError::InsufficientBalance {
                amount,
                balance: remaining,
            });
        }

        *self.output_map.entry(recipient.to_string()).or_insert(0) += amount;
        if let Some(change) = self.output_map.get_mut(&sender.public_key) {
            *change -= amount;
        }

        self.input = TxInput {
            timestamp: clock.now_millis(),
            amount: self.input.amount,
            address: sender.public_key.clone(),
            signature: sender.sign(&self.output_map),
        };
        Ok(())
    }

    pub fn output_total(&self) -> u128 {
        self.output_map.values().map(|v| *v as u128).sum()
    }

    /// Chain-independent sanity check: outputs balance the input and the
    /// signature covers the output map.
    pub fn is_valid(&self) -> bool {
        let output_total = self.output_total();
        if output_total != self.input.amount as u128 {
            error!(
                "Invalid transaction {} from {}: outputs total {} != input amount {}",
                self.id, self.input.address, output_total, self.input.amount
            );
            return false;
        }

        if !verify_signature(&self.input.address, &self.output_map, &self.input.signature) {
            error!(
                "Invalid signature on transaction {} from {}",
                self.id, self.input.address
            );
            return false;
        }

        true
    }
}
