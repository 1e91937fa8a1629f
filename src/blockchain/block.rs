use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, INITIAL_DIFFICULTY, MINE_RATE_MS};
use crate::clock::Clock;
use crate::crypto::hex_leading_zero_bits;
use crate::crypto_hash;
use crate::error::MineError;
use crate::transaction::Transaction;

/// Payload of a block: a list of transactions in normal operation, or an
/// opaque string for non-ledger use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Transactions(Vec<Transaction>),
    Raw(String),
}

impl BlockData {
    pub fn transactions(&self) -> Option<&[Transaction]> {
        match self {
            BlockData::Transactions(txs) => Some(txs),
            BlockData::Raw(_) => None,
        }
    }
}

impl From<Vec<Transaction>> for BlockData {
    fn from(txs: Vec<Transaction>) -> Self {
        BlockData::Transactions(txs)
    }
}

impl From<&str> for BlockData {
    fn from(raw: &str) -> Self {
        BlockData::Raw(raw.to_string())
    }
}

/// A single ledger entry with its proof-of-work solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64, // ms since epoch (UTC)
    pub last_hash: String,
    pub hash: String,
    pub data: BlockData,
    pub nonce: u64,
    pub difficulty: u32,
}

impl Block {
    /// The fixed first block of every chain.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: BlockData::Transactions(Vec::new()),
            nonce: 0,
            difficulty: INITIAL_DIFFICULTY,
        }
    }

    /// Canonical hash of this block's fields (excluding `hash` itself).
    pub fn compute_hash(&self) -> String {
        crypto_hash!(
            self.timestamp,
            self.last_hash,
            self.data,
            self.nonce,
            self.difficulty
        )
    }

    /// Whether the stored hash has at least `difficulty` leading zero bits.
    pub fn meets_difficulty(&self) -> bool {
        hex_leading_zero_bits(&self.hash) >= self.difficulty
    }

    /// Mine a block on top of `last_block`. Runs until a solution is found.
    pub fn mine_block(last_block: &Block, data: BlockData, clock: &dyn Clock) -> Block {
        Self::search(last_block, data, clock, None)
            .expect("uncancellable search only returns on success")
    }

    /// Like [`Block::mine_block`], but gives up once `cancel` is set.
    pub fn mine_block_cancellable(
        last_block: &Block,
        data: BlockData,
        clock: &dyn Clock,
        cancel: &AtomicBool,
    ) -> Result<Block, MineError> {
        Self::search(last_block, data, clock, Some(cancel)).ok_or(MineError::Cancelled)
    }

    fn search(
        last_block: &Block,
        data: BlockData,
        clock: &dyn Clock,
        cancel: Option<&AtomicBool>,
    ) -> Option<Block> {
        let mut block = Block {
            timestamp: 0,
            last_hash: last_block.hash.clone(),
            hash: String::new(),
            data,
            nonce: 0,
            difficulty: last_block.difficulty,
        };

        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                debug!("MINER - attempt on top of {} cancelled", last_block.hash);
                return None;
            }

            // Difficulty tracks elapsed time, so it is recomputed on every attempt.
            block.timestamp = clock.now_millis();
            block.difficulty = adjust_difficulty(last_block, block.timestamp);
            block.hash = block.compute_hash();

            if block.meets_difficulty() {
                debug!(
                    "MINER - found nonce {} (difficulty={}, hash={})",
                    block.nonce, block.difficulty, block.hash
                );
                return Some(block);
            }
            block.nonce = block.nonce.wrapping_add(1);
        }
    }
}

/// Ease the puzzle when `timestamp` is more than `MINE_RATE_MS` after the
/// original block, harden it otherwise. Never returns less than 1.
pub fn adjust_difficulty(original_block: &Block, timestamp: i64) -> u32 {
    let difficulty = original_block.difficulty;
    if difficulty < 1 {
        return 1;
    }

    if timestamp - original_block.timestamp > MINE_RATE_MS {
        (difficulty - 1).max(1)
    } else {
        difficulty + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use std::sync::atomic::AtomicI64;

    fn sample_block() -> Block {
        Block {
            timestamp: 2000,
            last_hash: "foo-hash".into(),
            hash: "bar-hash".into(),
            data: BlockData::Raw("blockchain data".into()),
            nonce: 1,
            difficulty: 1,
        }
    }

    #[test]
    fn genesis_is_the_fixed_constant() {
        let g = Block::genesis();
        assert_eq!(g.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(g.last_hash, "-");
        assert_eq!(g.hash, GENESIS_HASH);
        assert_eq!(g.data, BlockData::Transactions(vec![]));
        assert_eq!(g.nonce, 0);
        assert_eq!(g.difficulty, INITIAL_DIFFICULTY);
        assert_eq!(g, Block::genesis());
    }

    #[test]
    fn mined_block_links_to_last_block() {
        let last = Block::genesis();
        let mined = Block::mine_block(&last, "mined data".into(), &FixedClock(10_000));

        assert_eq!(mined.last_hash, last.hash);
        assert_eq!(mined.data, BlockData::Raw("mined data".into()));
        assert_eq!(mined.timestamp, 10_000);
    }

    #[test]
    fn mined_hash_recomputes_from_fields() {
        let last = Block::genesis();
        let mined = Block::mine_block(&last, "mined data".into(), &FixedClock(10_000));

        assert_eq!(
            mined.hash,
            crypto_hash!(
                mined.timestamp,
                last.hash,
                mined.data,
                mined.nonce,
                mined.difficulty
            )
        );
    }

    #[test]
    fn mined_hash_meets_difficulty() {
        let mut last = Block::genesis();
        for _ in 0..4 {
            let mined = Block::mine_block(&last, "x".into(), &FixedClock(50_000));
            assert!(hex_leading_zero_bits(&mined.hash) >= mined.difficulty);
            assert!(mined.meets_difficulty());
            last = mined;
        }
    }

    #[test]
    fn mining_adjusts_difficulty_by_one() {
        let last = Block::genesis();
        let mined = Block::mine_block(&last, "x".into(), &crate::clock::SystemClock);
        assert!(
            [last.difficulty + 1, last.difficulty - 1].contains(&mined.difficulty),
            "unexpected difficulty {}",
            mined.difficulty
        );
    }

    /// Advances by 1 ms on every reading.
    struct SteppingClock(AtomicI64);

    impl Clock for SteppingClock {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    #[test]
    fn difficulty_follows_the_clock_during_the_search() {
        let last = Block {
            timestamp: 10_000,
            last_hash: "older-hash".into(),
            hash: "last-hash".into(),
            data: BlockData::Raw("last".into()),
            nonce: 0,
            difficulty: 2,
        };
        // First attempt lands exactly on the mine rate, every later one is past it.
        let start = last.timestamp + MINE_RATE_MS;
        let clock = SteppingClock(AtomicI64::new(start));
        let first_attempt_difficulty = adjust_difficulty(&last, start);
        assert_eq!(first_attempt_difficulty, 3);

        // The first attempt (nonce 0, difficulty 3) hashes to 321a..., which misses.
        let mined = Block::mine_block(&last, "stepping".into(), &clock);

        assert!(mined.timestamp > start);
        assert_eq!(mined.difficulty, adjust_difficulty(&last, mined.timestamp));
        assert_ne!(mined.difficulty, first_attempt_difficulty);
        assert_eq!(mined.difficulty, 1);
        assert_eq!(mined.hash, mined.compute_hash());
        assert!(mined.meets_difficulty());
    }

    #[test]
    fn cancelled_mining_returns_error() {
        let cancel = AtomicBool::new(true);
        let result =
            Block::mine_block_cancellable(&Block::genesis(), "x".into(), &FixedClock(10_000), &cancel);
        assert_eq!(result, Err(MineError::Cancelled));
    }

    #[test]
    fn uncancelled_cancellable_mining_succeeds() {
        let cancel = AtomicBool::new(false);
        let mined =
            Block::mine_block_cancellable(&Block::genesis(), "x".into(), &FixedClock(10_000), &cancel)
                .unwrap();
        assert_eq!(mined.hash, mined.compute_hash());
    }

    #[test]
    fn raises_difficulty_for_quickly_mined_block() {
        let block = sample_block();
        assert_eq!(
            adjust_difficulty(&block, block.timestamp + MINE_RATE_MS - 100),
            block.difficulty + 1
        );
    }

    #[test]
    fn lowers_difficulty_for_slowly_mined_block() {
        let mut block = sample_block();
        block.difficulty = 5;
        assert_eq!(
            adjust_difficulty(&block, block.timestamp + MINE_RATE_MS + 100),
            4
        );
    }

    #[test]
    fn difficulty_has_lower_limit_of_one() {
        let mut block = sample_block();
        assert_eq!(adjust_difficulty(&block, block.timestamp + MINE_RATE_MS + 100), 1);

        block.difficulty = 0;
        assert_eq!(adjust_difficulty(&block, block.timestamp), 1);
        assert_eq!(adjust_difficulty(&block, block.timestamp + 10 * MINE_RATE_MS), 1);
    }

    #[test]
    fn tampered_data_changes_hash() {
        let mut mined = Block::mine_block(&Block::genesis(), "x".into(), &FixedClock(10_000));
        let old_hash = mined.hash.clone();
        mined.data = BlockData::Raw("malicious-data".into());
        assert_ne!(old_hash, mined.compute_hash());
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let json = serde_json::to_value(Block::genesis()).unwrap();
        assert_eq!(json["lastHash"], "-");
        assert_eq!(json["data"], serde_json::json!([]));
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, Block::genesis());
    }
}
