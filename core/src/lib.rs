//! FractalPoW core: consensus primitives, the two-stage proof-of-work
//! engine, balance ledger, mempool, and the single-writer chain manager.
//!
//! Everything outside this crate (`network`, `rpc`, `wallet`, `cli`) talks
//! to chain state only through [`chain::ChainHandle`] or the types defined
//! here — no other crate touches the store or ledger directly.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod amount;
pub mod block;
pub mod cancel;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod difficulty;
pub mod error;
pub mod fractal;
pub mod ledger;
pub mod mempool;
pub mod merkle;
pub mod miner;
pub mod pow;
pub mod reward;
pub mod store;
pub mod transaction;

pub use amount::Amount;
pub use cancel::CancelToken;
pub use error::{Error, Result};

/// 32-byte digest type shared by hashes, ids, and PoW seeds throughout the
/// crate.
pub type Hash = [u8; 32];

/// Current UNIX timestamp in seconds.
pub(crate) fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_secs()
}
