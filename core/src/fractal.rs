//! Deterministic Julia-set rendering and box-counting dimension estimate —
//! the second stage of FractalPoW.
//!
//! Nothing in the example pack computes this; the module is new, written
//! in the surrounding crate's style (pure functions, `Hash`-typed seeds,
//! doc comments on every public item). Evaluation order is pinned
//! (row-major sampling, box sizes in ascending order, closed-form OLS) so
//! that two independent implementations agree bit-for-bit on IEEE-754
//! double arithmetic.

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::crypto::sha256;
use crate::Hash;

pub const GRID_SIZE: usize = 128;
pub const MAX_ITER: u32 = 256;
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;
pub const BOX_SIZES: [usize; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Complex constant `c = c_re + i*c_im` a block's fractal is iterated with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalParams {
    pub c_re: f64,
    pub c_im: f64,
}

/// `fractal_seed = sha256(prev_hash || miner_address || nonce_le_bytes)`.
pub fn compute_seed(prev_hash: &Hash, miner_address: &str, nonce: u64) -> Hash {
    let mut buf = Vec::with_capacity(32 + miner_address.len() + 8);
    buf.extend_from_slice(prev_hash);
    buf.extend_from_slice(miner_address.as_bytes());
    buf.extend_from_slice(&nonce.to_le_bytes());
    sha256(&buf)
}

/// Derives `c` from the first 16 bytes of `seed`: two big-endian `u64`s
/// each mapped from `[0, 2^64)` into `[-1.0, 1.0]`.
pub fn derive_params(seed: &Hash) -> FractalParams {
    let a = u64::from_be_bytes(seed[0..8].try_into().expect("8 bytes"));
    let b = u64::from_be_bytes(seed[8..16].try_into().expect("8 bytes"));
    FractalParams {
        c_re: (a as f64 / TWO_POW_64) * 2.0 - 1.0,
        c_im: (b as f64 / TWO_POW_64) * 2.0 - 1.0,
    }
}

/// Renders the 128x128 bounded/escaped mask over `[-2,2] x [-2,2]`,
/// checking `cancel` once per row. Returns `None` if cancelled mid-render.
pub fn render_grid_cancellable(c: &FractalParams, cancel: &CancelToken) -> Option<Vec<bool>> {
    let mut mask = vec![false; GRID_SIZE * GRID_SIZE];
    let step = 4.0 / (GRID_SIZE as f64 - 1.0);
    for row in 0..GRID_SIZE {
        if cancel.is_cancelled() {
            return None;
        }
        let im0 = -2.0 + row as f64 * step;
        for col in 0..GRID_SIZE {
            let re0 = -2.0 + col as f64 * step;
            mask[row * GRID_SIZE + col] = is_bounded(re0, im0, c);
        }
    }
    Some(mask)
}

/// Renders the grid with no cancellation, for verification paths that must
/// always run to completion.
pub fn render_grid(c: &FractalParams) -> Vec<bool> {
    render_grid_cancellable(c, &CancelToken::new()).expect("a fresh token is never cancelled")
}

fn is_bounded(re0: f64, im0: f64, c: &FractalParams) -> bool {
    let mut zre = re0;
    let mut zim = im0;
    for _ in 0..MAX_ITER {
        let zre2 = zre * zre;
        let zim2 = zim * zim;
        if zre2 + zim2 > ESCAPE_RADIUS_SQ {
            return false;
        }
        let next_zre = zre2 - zim2 + c.c_re;
        let next_zim = 2.0 * zre * zim + c.c_im;
        zre = next_zre;
        zim = next_zim;
    }
    true
}

/// Box-counting dimension estimate over `mask`, rounded to 6 decimal
/// places for storage and comparison.
pub fn box_counting_dimension(mask: &[bool]) -> f64 {
    let mut points: Vec<(f64, f64)> = Vec::with_capacity(BOX_SIZES.len());
    for &size in BOX_SIZES.iter() {
        let count = count_occupied_boxes(mask, size);
        if count > 0 {
            points.push(((size as f64).ln(), (count as f64).ln()));
        }
    }
    if points.len() < 2 {
        return 0.0;
    }
    round6(-ols_slope(&points))
}

fn count_occupied_boxes(mask: &[bool], size: usize) -> u64 {
    let boxes_per_dim = GRID_SIZE.div_ceil(size);
    let mut count = 0u64;
    for box_y in 0..boxes_per_dim {
        for box_x in 0..boxes_per_dim {
            let mut occupied = false;
            'rows: for dy in 0..size {
                let y = box_y * size + dy;
                if y >= GRID_SIZE {
                    break;
                }
                for dx in 0..size {
                    let x = box_x * size + dx;
                    if x >= GRID_SIZE {
                        continue;
                    }
                    if mask[y * GRID_SIZE + x] {
                        occupied = true;
                        break 'rows;
                    }
                }
            }
            if occupied {
                count += 1;
            }
        }
    }
    count
}

/// Ordinary least-squares slope of `points` via the standard closed form.
fn ols_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for &(x, y) in points {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }
    if var == 0.0 {
        0.0
    } else {
        cov / var
    }
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// `true` iff `dim` is within `epsilon` of `target`.
pub fn valid_fractal(dim: f64, target: f64, epsilon: f64) -> bool {
    (dim - target).abs() <= epsilon
}
