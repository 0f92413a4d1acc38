//! Error types for the **FractalPow** core crate.
//!
//! Variants are grouped by the categories in the error-handling design:
//! format errors (rejected at the boundary), validation errors (block/tx
//! dropped, never mutate persisted state), store errors (commit aborts,
//! caller sees the error), and fatal errors (corruption, process exits).
//!
//! All high-level operations return [`crate::Result`].

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error)]
pub enum Error {
    // --- format errors ---
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    #[error("invalid key encoding")]
    InvalidKey,

    #[error("malformed signature")]
    MalformedSignature,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("oversize block: {0} bytes exceeds limit")]
    OversizeBlock(usize),

    // --- validation errors ---
    #[error("signature verification failed")]
    BadSignature,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("block previous hash mismatch")]
    PrevHashMismatch,

    #[error("block height non-sequential")]
    NonSequentialHeight,

    #[error("header hash does not meet the difficulty target")]
    DifficultyFail,

    #[error("fractal dimension failed verification")]
    InvalidFractal,

    #[error("merkle root mismatch")]
    BadMerkleRoot,

    #[error("coinbase amount does not match reward plus fees")]
    BadCoinbaseAmount,

    #[error("block coinbase shape is invalid")]
    BadCoinbaseShape,

    #[error("block timestamp is outside the allowed window")]
    TimestampOutOfWindow,

    #[error("mempool full and transaction ranks below every current entry")]
    MempoolFull,

    // --- store errors ---
    #[error("store error: {0}")]
    Store(String),

    // --- fatal errors ---
    #[error("chain corruption detected: {0}")]
    Corruption(String),
}

impl Error {
    /// True for errors that should bypass local recovery and lift to a
    /// process exit once the caller has flushed diagnostics.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(e: sled::transaction::TransactionError<Error>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => Error::Store(e.to_string()),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Store(format!("serialization failure: {e}"))
    }
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
