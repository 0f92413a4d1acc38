//! Block structure, header hash, full hash, and the invariants that don't
//! require chain context (Merkle root, header shape). Invariants that
//! require the parent/tip (linkage, timestamp monotonicity, coinbase
//! amount against the reward schedule) live in [`crate::chain`], which has
//! the state to check them.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::crypto::sha256;
use crate::fractal::{self, FractalParams};
use crate::merkle;
use crate::now_ts;
use crate::transaction::Transaction;
use crate::Hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub prev_hash: Hash,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub merkle_root: Hash,
    pub nonce: u64,
    /// Header-hash PoW target, as a count of required leading zero bits.
    pub difficulty: u32,
    pub fractal_params: FractalParams,
    pub fractal_dimension: f64,
    pub fractal_seed: Hash,
}

/// The fields hashed during the cheap PoW pre-filter: everything needed to
/// commit to the block's content except the fractal proof itself.
#[derive(Serialize)]
struct HeaderView<'a> {
    index: u64,
    prev_hash: &'a Hash,
    timestamp: u64,
    merkle_root: &'a Hash,
    nonce: u64,
    difficulty: u32,
    fractal_seed: &'a Hash,
}

impl Block {
    /// Recomputes the Merkle root from the current `transactions`.
    pub fn compute_merkle_root(&self) -> Hash {
        let txids: Vec<Hash> = self.transactions.iter().map(Transaction::txid).collect();
        merkle::root(&txids)
    }

    /// SHA-256 over the pre-fractal header fields — the cheap PoW pre-filter.
    pub fn header_hash(&self) -> Hash {
        let view = HeaderView {
            index: self.index,
            prev_hash: &self.prev_hash,
            timestamp: self.timestamp,
            merkle_root: &self.merkle_root,
            nonce: self.nonce,
            difficulty: self.difficulty,
            fractal_seed: &self.fractal_seed,
        };
        sha256(&bincode::serialize(&view).expect("header view serializes"))
    }

    /// SHA-256 over the full canonical block, including the fractal proof.
    /// This is the block's identifier.
    pub fn block_hash(&self) -> Hash {
        sha256(&bincode::serialize(self).expect("block serializes"))
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// The address the spec's open question resolves `fractal_seed`'s
    /// miner-address input to: the declared recipient of coinbase output 0.
    pub fn miner_address(&self) -> Option<&str> {
        self.coinbase().map(|tx| tx.to_address.as_str())
    }

    /// `true` iff exactly one transaction in the block is a coinbase, and
    /// it sits at position 0.
    pub fn has_single_leading_coinbase(&self) -> bool {
        match self.transactions.split_first() {
            Some((first, rest)) => first.is_coinbase() && rest.iter().all(|tx| !tx.is_coinbase()),
            None => false,
        }
    }

    /// Builds the network's genesis block from `cfg`'s fixed constants.
    /// Deterministic across runs: same config always yields the same
    /// `block_hash`.
    pub fn genesis(cfg: &Config) -> Self {
        let coinbase = Transaction::coinbase(cfg.genesis_address.clone(), cfg.initial_reward, 0);
        let transactions = vec![coinbase];
        let fractal_seed = sha256(b"fractalpow-genesis");
        let fractal_params = fractal::derive_params(&fractal_seed);
        let mask = fractal::render_grid(&fractal_params);
        let fractal_dimension = fractal::box_counting_dimension(&mask);

        let mut block = Block {
            index: 0,
            prev_hash: [0u8; 32],
            timestamp: 0,
            transactions,
            merkle_root: [0u8; 32],
            nonce: 0,
            difficulty: cfg.initial_difficulty,
            fractal_params,
            fractal_dimension,
            fractal_seed,
        };
        block.merkle_root = block.compute_merkle_root();
        block
    }

    /// Starts a fresh, unmined candidate extending `parent`. The miner
    /// fills in `nonce`/`fractal_*` via [`crate::pow::mine`].
    pub fn new_candidate(parent: &Block, transactions: Vec<Transaction>, difficulty: u32) -> Self {
        let mut block = Block {
            index: parent.index + 1,
            prev_hash: parent.block_hash(),
            timestamp: now_ts(),
            transactions,
            merkle_root: [0u8; 32],
            nonce: 0,
            difficulty,
            fractal_params: FractalParams { c_re: 0.0, c_im: 0.0 },
            fractal_dimension: 0.0,
            fractal_seed: [0u8; 32],
        };
        block.merkle_root = block.compute_merkle_root();
        block
    }
}
