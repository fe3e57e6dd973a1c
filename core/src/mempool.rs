//! Mempool Snapshot (C5): a bounded, recent view of pending transactions.
//!
//! Ordering reflects arrival. Admission assigns `mempool_position` and, once
//! the snapshot reaches `mempool_analysis_depth`, evicts the oldest entry to
//! admit the new one.

use std::collections::VecDeque;

use parking_lot::RwLock;

use crate::types::Transaction;

pub struct MempoolSnapshot {
    depth: usize,
    next_position: RwLock<u64>,
    entries: RwLock<VecDeque<Transaction>>,
}

impl MempoolSnapshot {
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            next_position: RwLock::new(0),
            entries: RwLock::new(VecDeque::with_capacity(depth.max(1))),
        }
    }

    /// Admits a transaction, assigning its `mempool_position`. If the
    /// snapshot is already at `depth`, the oldest entry is evicted first.
    pub fn admit(&self, mut tx: Transaction) {
        let position = {
            let mut next = self.next_position.write();
            let p = *next;
            *next += 1;
            p
        };
        tx.mempool_position = Some(position);

        let mut entries = self.entries.write();
        if entries.len() == self.depth {
            entries.pop_front();
        }
        entries.push_back(tx);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns a copy of the current snapshot in arrival order, for
    /// detectors to scan without holding the store lock.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.entries.read().iter().cloned().collect()
    }

    /// Transactions matching `pool_address`, useful for sandwich/JIT
    /// detectors that only care about a single pool.
    pub fn matching_pool(&self, pool_address: &str) -> Vec<Transaction> {
        self.entries
            .read()
            .iter()
            .filter(|tx| {
                tx.decoded
                    .as_ref()
                    .is_some_and(|d| d.pool_address == pool_address)
            })
            .cloned()
            .collect()
    }
}
