//! Minimal proof-of-work ledger: hash-chained blocks, difficulty retargeting,
//! signed value transfers and the validation rules for adopting a chain.

pub mod blockchain;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod node;
pub mod transaction;
pub mod wallet;

pub use blockchain::{Block, BlockData, Blockchain};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ChainError, MineError, NodeError, TransactionError};
pub use node::Node;
pub use transaction::{Transaction, TxInput};
pub use wallet::Wallet;
