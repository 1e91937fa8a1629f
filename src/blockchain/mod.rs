pub mod block;
pub mod model;

pub use block::{Block, BlockData};
pub use model::Blockchain;

/// Genesis block constants. Identical on every node, never mined.
pub const GENESIS_TIMESTAMP: i64 = 1;
pub const GENESIS_LAST_HASH: &str = "-";
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Difficulty of the genesis block (leading zero bits).
pub const INITIAL_DIFFICULTY: u32 = 3;

/// Target milliseconds between blocks.
pub const MINE_RATE_MS: i64 = 1000;

/// Amount minted to the miner of each block.
pub const MINING_REWARD: u64 = 50;

/// Balance of an address that has never sent a transaction, before receipts.
pub const STARTING_BALANCE: u64 = 1000;

/// Address carried by the input of every reward transaction.
pub const REWARD_INPUT_ADDRESS: &str = "*authorized-reward*";
