//! Transaction structure, signing, and per-transaction validation.
//!
//! Coinbase transactions have an empty `from_address` and `signature` and
//! a single credited output (`to_address`/`amount`); everything else is a
//! signed transfer that must validate against the sender's balance at
//! apply-time. Serialization is canonical (fixed field order, fixed
//! decimal precision via [`Amount`]) so `txid` is stable across
//! implementations.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::crypto::{self, Keypair};
use crate::error::{Error, Result};
use crate::now_ts;
use crate::Hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from_address: String,
    pub to_address: String,
    pub amount: Amount,
    pub fee: Amount,
    pub timestamp: u64,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub nonce: u64,
}

/// The fields a signature covers — everything except `signature`,
/// `public_key`, and the derived `txid`.
#[derive(Serialize)]
struct SigningView<'a> {
    from_address: &'a str,
    to_address: &'a str,
    amount: Amount,
    fee: Amount,
    timestamp: u64,
    nonce: u64,
}

impl Transaction {
    /// Builds an unsigned transfer; callers must call [`Transaction::sign`]
    /// before submission.
    pub fn new_unsigned(from_address: String, to_address: String, amount: Amount, fee: Amount, nonce: u64) -> Self {
        Self {
            from_address,
            to_address,
            amount,
            fee,
            timestamp: now_ts(),
            signature: Vec::new(),
            public_key: Vec::new(),
            nonce,
        }
    }

    /// Builds the coinbase transaction for block `height`, minting `amount`
    /// to `to_address`. Coinbase transactions carry no signature.
    pub fn coinbase(to_address: String, amount: Amount, height: u64) -> Self {
        Self {
            from_address: String::new(),
            to_address,
            amount,
            fee: Amount::ZERO,
            timestamp: now_ts(),
            signature: Vec::new(),
            public_key: Vec::new(),
            nonce: height,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.from_address.is_empty() && self.signature.is_empty()
    }

    fn signing_digest(&self) -> Hash {
        let view = SigningView {
            from_address: &self.from_address,
            to_address: &self.to_address,
            amount: self.amount,
            fee: self.fee,
            timestamp: self.timestamp,
            nonce: self.nonce,
        };
        let encoded = bincode::serialize(&view).expect("signing view serializes");
        crypto::sha256(&encoded)
    }

    /// Signs the transaction, filling `signature`, `public_key`, and
    /// thereby changing the value `txid()` returns.
    pub fn sign(&mut self, keypair: &Keypair) {
        let digest = self.signing_digest();
        self.signature = crypto::sign(keypair, &digest);
        self.public_key = keypair.public_key_bytes();
    }

    /// `sha256` of the canonical serialization of every field.
    pub fn txid(&self) -> Hash {
        let encoded = bincode::serialize(self).expect("transaction serializes");
        crypto::sha256(&encoded)
    }

    /// Format checks, signature verification, and balance sufficiency.
    /// `get_balance` is caller-provided so the check can run against a
    /// mempool snapshot, a ledger, or an in-block running balance.
    pub fn validate<F>(&self, get_balance: F) -> Result<()>
    where
        F: Fn(&str) -> Amount,
    {
        if self.is_coinbase() {
            return Ok(());
        }
        if self.from_address.len() < 25 || self.from_address.len() > 64 {
            return Err(Error::MalformedAddress(self.from_address.clone()));
        }
        if self.signature.is_empty() || self.public_key.is_empty() {
            return Err(Error::MalformedSignature);
        }
        let expected_address = crypto::address_from_pub(&self.public_key);
        if expected_address != self.from_address {
            return Err(Error::BadSignature);
        }
        let digest = self.signing_digest();
        if !crypto::verify(&self.public_key, &digest, &self.signature)? {
            return Err(Error::BadSignature);
        }
        let required = self.amount.checked_add(self.fee)?;
        if get_balance(&self.from_address) < required {
            return Err(Error::InsufficientBalance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    #[test]
    fn coinbase_has_no_signature_and_empty_sender() {
        let tx = Transaction::coinbase("miner".into(), Amount::from_coins(50), 1);
        assert!(tx.is_coinbase());
        assert!(tx.from_address.is_empty());
        assert!(tx.signature.is_empty());
    }

    #[test]
    fn signing_fixes_txid() {
        let keypair = generate_keypair();
        let from = crypto::address_from_pub(&keypair.public_key_bytes());
        let mut tx = Transaction::new_unsigned(from, "receiver".into(), Amount::from_coins(1), Amount::ZERO, 0);
        let before = tx.txid();
        tx.sign(&keypair);
        assert_ne!(before, tx.txid());
    }

    #[test]
    fn validate_accepts_sufficient_balance() {
        let keypair = generate_keypair();
        let from = crypto::address_from_pub(&keypair.public_key_bytes());
        let mut tx = Transaction::new_unsigned(from, "receiver".into(), Amount::from_coins(1), Amount::ZERO, 0);
        tx.sign(&keypair);
        assert!(tx.validate(|_| Amount::from_coins(10)).is_ok());
    }

    #[test]
    fn validate_rejects_insufficient_balance() {
        let keypair = generate_keypair();
        let from = crypto::address_from_pub(&keypair.public_key_bytes());
        let mut tx = Transaction::new_unsigned(from, "receiver".into(), Amount::from_coins(10), Amount::ZERO, 0);
        tx.sign(&keypair);
        assert!(matches!(
            tx.validate(|_| Amount::from_coins(1)),
            Err(Error::InsufficientBalance)
        ));
    }

    #[test]
    fn validate_rejects_tampered_amount_after_signing() {
        let keypair = generate_keypair();
        let from = crypto::address_from_pub(&keypair.public_key_bytes());
        let mut tx = Transaction::new_unsigned(from, "receiver".into(), Amount::from_coins(1), Amount::ZERO, 0);
        tx.sign(&keypair);
        tx.amount = Amount::from_coins(1000);
        assert!(matches!(tx.validate(|_| Amount::from_coins(1000)), Err(Error::BadSignature)));
    }
}
