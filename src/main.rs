use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::info;
use pow_ledger::config::Config;
use pow_ledger::node::spawn_miner;
use pow_ledger::{Node, SystemClock, Wallet};

/// The demo waits for `demo_blocks` mined blocks, or for the miner thread to stop.
fn keep_running(node: &Node, demo_blocks: usize, miner: &JoinHandle<()>) -> bool {
    node.len() <= demo_blocks && !miner.is_finished()
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    env_logger::init();

    println!("⛓️ Starting local ledger node ({config:?})");

    let clock = Arc::new(SystemClock);
    let node = Arc::new(Node::new(clock.clone()));
    let miner = Wallet::new();
    let mut alice = Wallet::new();
    let bob = Wallet::new();

    let transfer = node.create_transaction(&mut alice, &bob.public_key, config.transfer_amount)?;
    let pending = Arc::new(Mutex::new(vec![transfer]));
    let shutdown = Arc::new(AtomicBool::new(false));

    let handle = spawn_miner(
        Arc::clone(&node),
        miner.clone(),
        Arc::clone(&pending),
        Arc::clone(&shutdown),
    );
    while keep_running(&node, config.demo_blocks, &handle) {
        {
            let mut pool = pending
                .lock()
                .map_err(|_| anyhow::anyhow!("pending pool poisoned"))?;
            if pool.is_empty() {
                pool.push(node.create_transaction(&mut alice, &bob.public_key, config.transfer_amount)?);
            }
        }
        thread::sleep(Duration::from_millis(20));
    }
    shutdown.store(true, Ordering::SeqCst);
    node.cancel_mining();
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("miner thread panicked"))?;

    // A fresh peer adopts the mined chain through the fork-choice rule.
    let peer = Node::new(clock);
    peer.replace_chain(node.snapshot(), config.validate_transactions, || {
        info!("peer adopted the longer chain; would re-broadcast here");
    })?;

    println!("height:  {}", peer.len() - 1);
    println!("miner:   {}", peer.balance_of(&miner.public_key));
    println!("alice:   {}", peer.balance_of(&alice.public_key));
    println!("bob:     {}", peer.balance_of(&bob.public_key));
    Ok(())
}
