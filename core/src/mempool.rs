//! Bounded pool of pending transactions.
//!
//! Admission is format/signature validation only — balance sufficiency is
//! rechecked at block-assembly time against the current ledger snapshot, so
//! a transaction can sit in the pool even if its sender later overdrafts.
//! When full, the lowest-fee transaction is evicted to make room; ties
//! break by earliest `timestamp`, then by `txid` ascending, for a total
//! order that doesn't depend on hash-map iteration.

use std::collections::HashMap;

use crate::transaction::Transaction;
use crate::Hash;

pub struct Mempool {
    capacity: usize,
    entries: HashMap<Hash, Transaction>,
}

impl Mempool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, txid: &Hash) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash) -> Option<&Transaction> {
        self.entries.get(txid)
    }

    /// Inserts `tx`, evicting the lowest-ranked entry first if the pool is
    /// already at capacity. Returns `false` (without inserting) if `tx`
    /// itself ranks at or below every current entry and the pool is full.
    pub fn insert(&mut self, tx: Transaction) -> bool {
        let txid = tx.txid();
        if self.entries.contains_key(&txid) {
            return true;
        }
        if self.entries.len() >= self.capacity {
            let weakest = self.weakest_txid();
            match weakest {
                Some(weakest_id) if rank(&self.entries[&weakest_id], &weakest_id) < rank(&tx, &txid) => {
                    self.entries.remove(&weakest_id);
                }
                _ => return false,
            }
        }
        self.entries.insert(txid, tx);
        true
    }

    pub fn remove(&mut self, txid: &Hash) {
        self.entries.remove(txid);
    }

    /// Transactions ordered highest fee first, for block assembly; ties
    /// break the same way eviction does, for a deterministic candidate
    /// block across identical mempool states.
    pub fn by_fee_desc(&self) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self.entries.values().cloned().collect();
        txs.sort_by(|a, b| {
            let ra = rank(a, &a.txid());
            let rb = rank(b, &b.txid());
            rb.cmp(&ra)
        });
        txs
    }

    fn weakest_txid(&self) -> Option<Hash> {
        self.entries
            .iter()
            .min_by(|(id_a, a), (id_b, b)| rank(a, id_a).cmp(&rank(b, id_b)))
            .map(|(id, _)| *id)
    }
}

/// Orders by `(fee, Reverse(timestamp), Reverse(txid))` so that a *higher*
/// rank means "keep this one over others" — the weakest entry is the
/// minimum under this key.
fn rank(tx: &Transaction, txid: &Hash) -> (u64, std::cmp::Reverse<u64>, std::cmp::Reverse<Hash>) {
    (tx.fee.units(), std::cmp::Reverse(tx.timestamp), std::cmp::Reverse(*txid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;

    fn tx(fee_units: u64, nonce: u64) -> Transaction {
        Transaction::new_unsigned("sender".into(), "recv".into(), Amount::from_coins(1), Amount::from_units(fee_units), nonce)
    }

    #[test]
    fn insert_and_contains() {
        let mut pool = Mempool::new(10);
        let t = tx(100, 0);
        let id = t.txid();
        assert!(pool.insert(t.clone()));
        assert!(pool.contains(&id));
        assert_eq!(pool.get(&id), Some(&t));
    }

    #[test]
    fn evicts_lowest_fee_when_full() {
        let mut pool = Mempool::new(2);
        let low = tx(1, 0);
        let mid = tx(50, 1);
        let high = tx(100, 2);
        let low_id = low.txid();
        pool.insert(low);
        pool.insert(mid);
        assert!(pool.insert(high));
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&low_id));
    }

    #[test]
    fn rejects_weaker_than_everything_when_full() {
        let mut pool = Mempool::new(1);
        pool.insert(tx(100, 0));
        assert!(!pool.insert(tx(1, 1)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn by_fee_desc_orders_highest_first() {
        let mut pool = Mempool::new(10);
        pool.insert(tx(10, 0));
        pool.insert(tx(100, 1));
        pool.insert(tx(50, 2));
        let ordered = pool.by_fee_desc();
        assert_eq!(ordered[0].fee, Amount::from_units(100));
        assert_eq!(ordered[2].fee, Amount::from_units(10));
    }
}
