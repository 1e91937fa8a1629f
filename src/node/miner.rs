use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use super::Node;
use crate::error::{MineError, NodeError};
use crate::transaction::Transaction;
use crate::wallet::Wallet;

/// How long the miner waits before looking at an empty pool again.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Run the transaction-miner on a dedicated thread until `shutdown` is set.
///
/// Each round snapshots `pending`, mines its selectable transactions plus a
/// reward for `miner`, and on success removes the included transactions from
/// `pending`. A cancelled or stale round leaves `pending` untouched. No block
/// is mined while nothing in `pending` can be included.
pub fn spawn_miner(
    node: Arc<Node>,
    miner: Wallet,
    pending: Arc<Mutex<Vec<Transaction>>>,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !shutdown.load(Ordering::SeqCst) {
            let snapshot = {
                let pool = pending.lock().expect("mutex poisoned");
                pool.clone()
            };

            if node.select_transactions(&snapshot).is_empty() {
                thread::sleep(IDLE_POLL);
                continue;
            }

            match node.mine_transactions(&snapshot, &miner) {
                Ok(block) => {
                    let included: HashSet<String> = block
                        .data
                        .transactions()
                        .unwrap_or_default()
                        .iter()
                        .map(|tx| tx.id.clone())
                        .collect();

                    let mut pool = pending.lock().expect("mutex poisoned");
                    let before = pool.len();
                    pool.retain(|tx| !included.contains(&tx.id));
                    debug!(
                        "Pending pool cleaned: {} -> {} (removed {})",
                        before,
                        pool.len(),
                        before.saturating_sub(pool.len())
                    );
                }
                Err(NodeError::Mine(MineError::Cancelled)) | Err(NodeError::StaleTip { .. }) => {
                    info!("MINER - round abandoned, restarting on the new tip");
                }
                Err(e) => {
                    warn!("MINER - round failed: {e}");
                }
            }
        }
        debug!("MINER - shutting down");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Blockchain;
    use crate::clock::SystemClock;
    use std::time::{Duration, Instant};

    #[test]
    fn mines_pending_transactions_until_shutdown() {
        let node = Arc::new(Node::new(Arc::new(SystemClock)));
        let miner = Wallet::new();
        let mut sender = Wallet::new();

        let tx = node.create_transaction(&mut sender, "foo", 25).unwrap();
        let pending = Arc::new(Mutex::new(vec![tx.clone()]));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = spawn_miner(
            Arc::clone(&node),
            miner.clone(),
            Arc::clone(&pending),
            Arc::clone(&shutdown),
        );

        let wait_for = |height: usize| {
            let deadline = Instant::now() + Duration::from_secs(30);
            while (node.len() < height || !pending.lock().unwrap().is_empty())
                && Instant::now() < deadline
            {
                thread::sleep(Duration::from_millis(10));
            }
        };

        wait_for(2);
        let second = node.create_transaction(&mut sender, "bar", 5).unwrap();
        pending.lock().unwrap().push(second.clone());
        wait_for(3);

        // Nothing left to include: the miner idles instead of minting rewards.
        thread::sleep(IDLE_POLL * 4);
        assert_eq!(node.len(), 3);

        shutdown.store(true, Ordering::SeqCst);
        node.cancel_mining();
        handle.join().unwrap();

        let chain = node.snapshot();
        assert!(Blockchain::is_valid_chain(&chain));
        assert!(Blockchain::valid_transaction_data(&chain));
        assert!(pending.lock().unwrap().is_empty());

        assert_eq!(chain[1].data.transactions().unwrap()[0], tx);
        assert_eq!(chain[2].data.transactions().unwrap()[0], second);
        assert_eq!(node.balance_of(&miner.public_key), 1000 + 2 * 50);
        assert_eq!(node.balance_of(&sender.public_key), 1000 - 25 - 5);
    }

    #[test]
    fn empty_pool_mines_nothing() {
        let node = Arc::new(Node::new(Arc::new(SystemClock)));
        let pending = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = spawn_miner(
            Arc::clone(&node),
            Wallet::new(),
            Arc::clone(&pending),
            Arc::clone(&shutdown),
        );
        thread::sleep(IDLE_POLL * 4);
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(node.len(), 1);
    }
}
