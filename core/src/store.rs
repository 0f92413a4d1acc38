//! Persistent chain storage.
//!
//! [`ChainStore`] is the boundary the chain manager commits through; the
//! only hard requirement is that `commit_block` applies the block row, its
//! transaction rows, and every balance delta as one atomic unit — a failure
//! partway through must leave the store exactly as it was before the call.
//! [`MemStore`] satisfies that with a `Mutex`-guarded in-memory map, for
//! deterministic tests with no I/O; [`SledStore`] satisfies it with a
//! single `sled` transaction over namespaced keys in one tree.

use std::collections::HashMap;
use std::sync::Mutex;

use sled::transaction::Transactional;

use crate::amount::Amount;
use crate::block::Block;
use crate::error::{Error, Result};
use crate::Hash;

/// Chain metadata and balance deltas produced by applying one block,
/// bundled so a store implementation can commit them atomically.
pub struct BlockCommit<'a> {
    pub block: &'a Block,
    pub balance_deltas: &'a [(String, Amount)],
}

pub trait ChainStore: Send + Sync {
    fn height(&self) -> Result<Option<u64>>;
    fn tip_hash(&self) -> Result<Option<Hash>>;
    fn get_block_by_index(&self, index: u64) -> Result<Option<Block>>;
    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>>;
    fn get_balance(&self, address: &str) -> Result<Amount>;

    /// Atomically appends `commit.block` and overwrites every address in
    /// `commit.balance_deltas` with its new absolute balance.
    fn commit_block(&self, commit: BlockCommit<'_>) -> Result<()>;
}

/// In-memory [`ChainStore`] for tests: no partial-failure path exists, so
/// atomicity is trivially satisfied by holding a single lock across the
/// whole commit.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemStoreInner>,
}

#[derive(Default)]
struct MemStoreInner {
    by_index: HashMap<u64, Block>,
    by_hash: HashMap<Hash, u64>,
    balances: HashMap<String, Amount>,
    height: Option<u64>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemStore {
    fn height(&self) -> Result<Option<u64>> {
        Ok(self.inner.lock().expect("mem store lock").height)
    }

    fn tip_hash(&self) -> Result<Option<Hash>> {
        let guard = self.inner.lock().expect("mem store lock");
        Ok(guard
            .height
            .and_then(|h| guard.by_index.get(&h))
            .map(Block::block_hash))
    }

    fn get_block_by_index(&self, index: u64) -> Result<Option<Block>> {
        Ok(self.inner.lock().expect("mem store lock").by_index.get(&index).cloned())
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        let guard = self.inner.lock().expect("mem store lock");
        Ok(guard.by_hash.get(hash).and_then(|idx| guard.by_index.get(idx)).cloned())
    }

    fn get_balance(&self, address: &str) -> Result<Amount> {
        Ok(self
            .inner
            .lock()
            .expect("mem store lock")
            .balances
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    fn commit_block(&self, commit: BlockCommit<'_>) -> Result<()> {
        let mut guard = self.inner.lock().expect("mem store lock");
        let hash = commit.block.block_hash();
        guard.by_index.insert(commit.block.index, commit.block.clone());
        guard.by_hash.insert(hash, commit.block.index);
        for (address, balance) in commit.balance_deltas {
            guard.balances.insert(address.clone(), *balance);
        }
        guard.height = Some(commit.block.index);
        Ok(())
    }
}

const TREE_META: &str = "meta";
const TREE_BLOCKS_BY_INDEX: &str = "blocks_by_index";
const TREE_HASH_TO_INDEX: &str = "hash_to_index";
const TREE_BALANCES: &str = "balances";
const KEY_HEIGHT: &[u8] = b"height";

/// `sled`-backed [`ChainStore`]. Each logical table is its own tree; the
/// commit uses sled's multi-tree transaction API so the block row, the
/// hash index, and every balance write land together or not at all.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn tree(&self, name: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(name)?)
    }
}

impl ChainStore for SledStore {
    fn height(&self) -> Result<Option<u64>> {
        let meta = self.tree(TREE_META)?;
        Ok(meta
            .get(KEY_HEIGHT)?
            .map(|v| u64::from_be_bytes(v.as_ref().try_into().expect("8-byte height"))))
    }

    fn tip_hash(&self) -> Result<Option<Hash>> {
        match self.height()? {
            Some(h) => Ok(self.get_block_by_index(h)?.map(|b| b.block_hash())),
            None => Ok(None),
        }
    }

    fn get_block_by_index(&self, index: u64) -> Result<Option<Block>> {
        let blocks = self.tree(TREE_BLOCKS_BY_INDEX)?;
        match blocks.get(index.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        let index_tree = self.tree(TREE_HASH_TO_INDEX)?;
        match index_tree.get(hash)? {
            Some(idx_bytes) => {
                let idx = u64::from_be_bytes(idx_bytes.as_ref().try_into().expect("8-byte index"));
                self.get_block_by_index(idx)
            }
            None => Ok(None),
        }
    }

    fn get_balance(&self, address: &str) -> Result<Amount> {
        let balances = self.tree(TREE_BALANCES)?;
        match balances.get(address.as_bytes())? {
            Some(bytes) => Ok(Amount::from_units(u64::from_be_bytes(
                bytes.as_ref().try_into().expect("8-byte amount"),
            ))),
            None => Ok(Amount::ZERO),
        }
    }

    fn commit_block(&self, commit: BlockCommit<'_>) -> Result<()> {
        let meta = self.tree(TREE_META)?;
        let blocks = self.tree(TREE_BLOCKS_BY_INDEX)?;
        let hash_index = self.tree(TREE_HASH_TO_INDEX)?;
        let balances = self.tree(TREE_BALANCES)?;

        let block_bytes = bincode::serialize(commit.block)?;
        let hash = commit.block.block_hash();
        let index_bytes = commit.block.index.to_be_bytes();

        (&meta, &blocks, &hash_index, &balances)
            .transaction(|(meta, blocks, hash_index, balances)| {
                blocks.insert(&index_bytes, block_bytes.as_slice())?;
                hash_index.insert(&hash, &index_bytes)?;
                meta.insert(KEY_HEIGHT, &index_bytes)?;
                for (address, amount) in commit.balance_deltas {
                    balances.insert(address.as_bytes(), &amount.units().to_be_bytes())?;
                }
                Ok::<(), sled::transaction::ConflictableTransactionError<Error>>(())
            })
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::transaction::Transaction;

    #[test]
    fn mem_store_round_trips_genesis() {
        let cfg = Config::default();
        let genesis = Block::genesis(&cfg);
        let store = MemStore::new();
        store
            .commit_block(BlockCommit {
                block: &genesis,
                balance_deltas: &[(cfg.genesis_address.clone(), cfg.initial_reward)],
            })
            .unwrap();
        assert_eq!(store.height().unwrap(), Some(0));
        assert_eq!(store.get_balance(&cfg.genesis_address).unwrap(), cfg.initial_reward);
        let fetched = store.get_block_by_index(0).unwrap().unwrap();
        assert_eq!(fetched.block_hash(), genesis.block_hash());
    }

    #[test]
    fn mem_store_looks_up_by_hash() {
        let cfg = Config::default();
        let genesis = Block::genesis(&cfg);
        let store = MemStore::new();
        store
            .commit_block(BlockCommit {
                block: &genesis,
                balance_deltas: &[],
            })
            .unwrap();
        let hash = genesis.block_hash();
        let fetched = store.get_block_by_hash(&hash).unwrap().unwrap();
        assert_eq!(fetched.index, 0);
    }

    #[test]
    fn unknown_address_has_zero_balance() {
        let store = MemStore::new();
        assert_eq!(store.get_balance("nobody").unwrap(), Amount::ZERO);
    }

    #[test]
    fn second_commit_overwrites_height_and_adds_block() {
        let cfg = Config::default();
        let genesis = Block::genesis(&cfg);
        let store = MemStore::new();
        store
            .commit_block(BlockCommit { block: &genesis, balance_deltas: &[] })
            .unwrap();
        let coinbase = Transaction::coinbase("miner".into(), cfg.initial_reward, 1);
        let next = Block::new_candidate(&genesis, vec![coinbase], cfg.initial_difficulty);
        store
            .commit_block(BlockCommit { block: &next, balance_deltas: &[("miner".into(), cfg.initial_reward)] })
            .unwrap();
        assert_eq!(store.height().unwrap(), Some(1));
        assert_eq!(store.get_balance("miner").unwrap(), cfg.initial_reward);
    }
}
