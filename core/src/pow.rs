//! Two-stage FractalPoW: a leading-zero-bit header hash pre-filter plus the
//! Julia-set box-counting dimension gate from [`crate::fractal`].
//!
//! The header-hash check is ~10^4x cheaper than a fractal render, so the
//! miner always tries it first — difficulty is carried primarily by the
//! header-bits target, with the fractal acting as a verifiable proof of
//! bounded-dimension work on top.

use crate::block::Block;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::fractal;
use crate::Hash;

/// `true` if `hash` has at least `difficulty` leading zero bits (0-256).
pub fn hash_meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    if difficulty == 0 {
        return true;
    }
    let zero_bytes = (difficulty / 8) as usize;
    let zero_bits = (difficulty % 8) as u8;

    if zero_bytes > hash.len() || hash.iter().take(zero_bytes).any(|&b| b != 0) {
        return false;
    }
    if zero_bits == 0 {
        return true;
    }
    match hash.get(zero_bytes) {
        Some(&next_byte) => next_byte.leading_zeros() as u8 >= zero_bits,
        None => true,
    }
}

pub struct MineParams {
    pub target_dimension: f64,
    pub epsilon: f64,
}

/// Drives `block.nonce` upward until both PoW stages are satisfied,
/// filling in the fractal fields on success. Polls `cancel` once per
/// nonce and once per fractal grid row. Returns `false` if cancelled or
/// if the nonce space is exhausted.
pub fn mine(block: &mut Block, miner_address: &str, params: &MineParams, cancel: &CancelToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        // fractal_seed is part of the header preimage and a function of
        // nonce, so it must be set before header_hash() is filtered. The
        // digest that clears the difficulty check has to be the same one
        // the stored block carries.
        let seed = fractal::compute_seed(&block.prev_hash, miner_address, block.nonce);
        block.fractal_seed = seed;
        if hash_meets_difficulty(&block.header_hash(), block.difficulty) {
            let c = fractal::derive_params(&seed);
            match fractal::render_grid_cancellable(&c, cancel) {
                Some(mask) => {
                    let dim = fractal::box_counting_dimension(&mask);
                    if fractal::valid_fractal(dim, params.target_dimension, params.epsilon) {
                        block.fractal_params = c;
                        block.fractal_dimension = dim;
                        return true;
                    }
                }
                None => return false,
            }
        }
        let (next, overflowed) = block.nonce.overflowing_add(1);
        if overflowed {
            return false;
        }
        block.nonce = next;
    }
}

/// Re-derives both PoW stages from `block`'s own fields and checks them
/// against the values it claims. All four gates are hard errors.
pub fn verify(block: &Block, target_dimension: f64, epsilon: f64) -> Result<()> {
    let miner_address = block.miner_address().ok_or(Error::BadCoinbaseShape)?;

    if !hash_meets_difficulty(&block.header_hash(), block.difficulty) {
        return Err(Error::DifficultyFail);
    }

    let expected_seed = fractal::compute_seed(&block.prev_hash, miner_address, block.nonce);
    if expected_seed != block.fractal_seed {
        return Err(Error::InvalidFractal);
    }

    let expected_c = fractal::derive_params(&expected_seed);
    if expected_c.c_re != block.fractal_params.c_re || expected_c.c_im != block.fractal_params.c_im {
        return Err(Error::InvalidFractal);
    }

    let mask = fractal::render_grid(&expected_c);
    let dim = fractal::box_counting_dimension(&mask);
    if dim != block.fractal_dimension {
        return Err(Error::InvalidFractal);
    }
    if !fractal::valid_fractal(dim, target_dimension, epsilon) {
        return Err(Error::InvalidFractal);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::config::Config;
    use crate::transaction::Transaction;

    #[test]
    fn zero_difficulty_always_passes() {
        assert!(hash_meets_difficulty(&[0xAAu8; 32], 0));
    }

    #[test]
    fn nonzero_difficulty_rejects_nonzero_prefix() {
        let hash = [0xFFu8; 32];
        assert!(!hash_meets_difficulty(&hash, 8));
    }

    #[test]
    fn mine_then_verify_round_trips() {
        let cfg = Config::default();
        let parent = Block::genesis(&cfg);
        let coinbase = Transaction::coinbase("miner-addr".into(), cfg.initial_reward, 1);
        let mut candidate = Block::new_candidate(&parent, vec![coinbase], 0);
        let params = MineParams { target_dimension: 1.5, epsilon: 0.5 };
        let cancel = CancelToken::new();
        assert!(mine(&mut candidate, "miner-addr", &params, &cancel));
        assert!(verify(&candidate, params.target_dimension, params.epsilon).is_ok());
    }

    #[test]
    fn cancelled_mining_returns_false() {
        let cfg = Config::default();
        let parent = Block::genesis(&cfg);
        let coinbase = Transaction::coinbase("miner-addr".into(), cfg.initial_reward, 1);
        let mut candidate = Block::new_candidate(&parent, vec![coinbase], 64);
        let params = MineParams { target_dimension: 1.5, epsilon: 0.001 };
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!mine(&mut candidate, "miner-addr", &params, &cancel));
    }
}
