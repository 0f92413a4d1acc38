//! Thin wallet: key generation, address derivation, and transaction
//! signing built directly on `fractalpow-core`'s SECP256k1 primitives. No
//! key storage format or CLI front-end lives here — the `cli` crate owns
//! that.

use fractalpow_core::amount::Amount;
use fractalpow_core::crypto::{self, Keypair};
use fractalpow_core::transaction::Transaction;

pub struct Wallet {
    keypair: Keypair,
    pub address: String,
}

impl Wallet {
    pub fn generate() -> Self {
        let keypair = crypto::generate_keypair();
        let address = crypto::address_from_pub(&keypair.public_key_bytes());
        Self { keypair, address }
    }

    /// Builds and signs a transfer from this wallet's address.
    pub fn send(&self, to_address: &str, amount: Amount, fee: Amount, nonce: u64) -> Transaction {
        let mut tx = Transaction::new_unsigned(self.address.clone(), to_address.to_string(), amount, fee, nonce);
        tx.sign(&self.keypair);
        tx
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public_key_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_wallet_signs_a_valid_transfer() {
        let wallet = Wallet::generate();
        let tx = wallet.send("recipient", Amount::from_coins(1), Amount::ZERO, 0);
        assert!(tx.validate(|_| Amount::from_coins(10)).is_ok());
    }
}
