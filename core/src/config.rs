//! Consensus and runtime configuration for **FractalPow** core.
//!
//! [`Config`] centralises every chain-wide constant named in the spec:
//! genesis parameters, the two difficulty actuators' starting values, the
//! retarget cadence, the reward schedule, and mempool/block-size bounds.
//! It is built via the fluent [`ConfigBuilder`] so callers only override
//! the fields they care about. The core never parses a config file itself
//! (that belongs to the process wrapper); this struct is the boundary.
//!
//! ```
//! use fractalpow_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.initial_difficulty, 20);
//! ```

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Runtime configuration shared across the crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Human-readable network id ("main", "test", "dev") — distinguishes
    /// peers speaking incompatible chains at the wire-protocol level.
    pub network: String,

    /// Initial header-hash PoW target, as a count of required leading
    /// zero bits (0-256).
    pub initial_difficulty: u32,

    /// Chain-wide target for the fractal box-counting dimension. Constant
    /// per network; only the acceptance window (`initial_epsilon`, and
    /// its retargeted successors) moves.
    pub target_dimension: f64,

    /// Initial acceptance window around `target_dimension`.
    pub initial_epsilon: f64,

    /// Blocks between difficulty retargets.
    pub retarget_interval: u64,

    /// Target average seconds between blocks.
    pub target_block_time_secs: u64,

    /// Blocks between reward halvings.
    pub halving_interval: u64,

    /// Block subsidy paid to the miner before any halving.
    pub initial_reward: Amount,

    /// Maximum number of pending transactions held in the mempool.
    pub mempool_capacity: usize,

    /// Maximum serialized block size, in bytes.
    pub max_block_bytes: usize,

    /// How far into the future a block's timestamp may be relative to
    /// local wall-clock time before it is rejected.
    pub max_future_drift_secs: u64,

    /// Address credited with the genesis block's coinbase.
    pub genesis_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: "main".into(),
            initial_difficulty: 20,
            target_dimension: 1.5,
            initial_epsilon: 0.001,
            retarget_interval: 2016,
            target_block_time_secs: 600,
            halving_interval: 210_000,
            initial_reward: Amount::from_coins(50),
            mempool_capacity: 10_000,
            max_block_bytes: 1_000_000,
            max_future_drift_secs: 7_200,
            genesis_address: "0000000000000000000000000000000000000000".into(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self {
            inner: Config::default(),
        }
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    pub fn initial_difficulty(mut self, bits: u32) -> Self {
        self.inner.initial_difficulty = bits;
        self
    }

    pub fn target_dimension(mut self, dim: f64) -> Self {
        self.inner.target_dimension = dim;
        self
    }

    pub fn initial_epsilon(mut self, epsilon: f64) -> Self {
        self.inner.initial_epsilon = epsilon;
        self
    }

    pub fn retarget_interval(mut self, interval: u64) -> Self {
        self.inner.retarget_interval = interval;
        self
    }

    pub fn target_block_time_secs(mut self, secs: u64) -> Self {
        self.inner.target_block_time_secs = secs;
        self
    }

    pub fn initial_reward(mut self, reward: Amount) -> Self {
        self.inner.initial_reward = reward;
        self
    }

    pub fn mempool_capacity(mut self, capacity: usize) -> Self {
        self.inner.mempool_capacity = capacity;
        self
    }

    pub fn max_block_bytes(mut self, bytes: usize) -> Self {
        self.inner.max_block_bytes = bytes;
        self
    }

    pub fn genesis_address<S: Into<String>>(mut self, addr: S) -> Self {
        self.inner.genesis_address = addr.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .initial_difficulty(1)
            .target_dimension(1.5)
            .initial_epsilon(0.5)
            .network("test")
            .finish();
        assert_eq!(cfg.initial_difficulty, 1);
        assert_eq!(cfg.initial_epsilon, 0.5);
        assert_eq!(cfg.network, "test");
    }
}
