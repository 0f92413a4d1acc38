//! Cooperative cancellation handle shared by the miner's nonce loop and its
//! fractal-rendering inner loop.
//!
//! Replaces ad-hoc flag polling: a single [`CancelToken`] is cloned into
//! every layer of the mining search, so a cancellation triggered at any
//! point (shutdown, or the chain tip advancing underneath the miner) is
//! observed within one nonce iteration or one fractal grid row, whichever
//! is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
