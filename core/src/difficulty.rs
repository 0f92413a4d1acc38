//! Joint retarget of the header-hash difficulty and the fractal epsilon
//! acceptance window. Both actuators move in the same direction each
//! retarget: a wider epsilon speeds mining, a narrower one tightens it,
//! same as an easier/harder header-bits target.

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyState {
    pub header_bits: u32,
    pub epsilon: f64,
}

impl DifficultyState {
    pub fn initial(cfg: &Config) -> Self {
        Self {
            header_bits: cfg.initial_difficulty,
            epsilon: cfg.initial_epsilon,
        }
    }

    /// Computes the retargeted state from the timestamps bounding the
    /// just-completed window: `first_ts` is the timestamp of the window's
    /// first block, `last_ts` of its last.
    pub fn retarget(&self, first_ts: u64, last_ts: u64, cfg: &Config) -> DifficultyState {
        let target_time = (cfg.retarget_interval * cfg.target_block_time_secs) as f64;
        let actual_time = last_ts.saturating_sub(first_ts) as f64;
        // Guard against a zero-width window collapsing the ratio to zero.
        let actual_time = actual_time.max(1.0);
        let ratio = (actual_time / target_time).clamp(0.25, 4.0);

        let bits_delta = (1.0 / ratio).log2().round() as i64;
        let new_bits = (self.header_bits as i64 + bits_delta).clamp(1, 64) as u32;

        let new_epsilon = (self.epsilon * ratio).clamp(1e-6, 0.5);

        DifficultyState {
            header_bits: new_bits,
            epsilon: new_epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_than_target_increases_bits_and_shrinks_epsilon() {
        let cfg = Config::default();
        let state = DifficultyState::initial(&cfg);
        // 2016 blocks spaced 300s apart: half the 600s target.
        let first_ts = 0;
        let last_ts = cfg.retarget_interval * 300;
        let next = state.retarget(first_ts, last_ts, &cfg);
        assert_eq!(next.header_bits, state.header_bits + 1);
        assert!((next.epsilon - state.epsilon * 0.5).abs() < 1e-12);
    }

    #[test]
    fn slower_than_target_decreases_bits_and_widens_epsilon() {
        let cfg = Config::default();
        let state = DifficultyState::initial(&cfg);
        let first_ts = 0;
        let last_ts = cfg.retarget_interval * 1200; // twice the target
        let next = state.retarget(first_ts, last_ts, &cfg);
        assert_eq!(next.header_bits, state.header_bits - 1);
        assert!((next.epsilon - state.epsilon * 2.0).abs() < 1e-9);
    }

    #[test]
    fn ratio_is_clamped_to_quarter_and_quadruple() {
        let cfg = Config::default();
        let state = DifficultyState::initial(&cfg);
        let extreme = state.retarget(0, cfg.retarget_interval * 1_000_000, &cfg);
        // clamp(ratio, 0.25, 4.0) caps the swing to 2 bits either way.
        assert!(extreme.header_bits >= state.header_bits.saturating_sub(2));
    }

    #[test]
    fn header_bits_never_drop_below_one() {
        let cfg = Config::default();
        let mut state = DifficultyState { header_bits: 1, epsilon: cfg.initial_epsilon };
        state = state.retarget(0, cfg.retarget_interval * cfg.target_block_time_secs * 10, &cfg);
        assert!(state.header_bits >= 1);
    }
}
