//! Balance-account ledger.
//!
//! Generalizes the teacher's UTXO set into a plain `address -> balance` map,
//! per the design's "no per-UTXO structure is required" call: a coinbase
//! credits its recipient directly, a transfer debits the sender `amount +
//! fee` and credits the recipient `amount`, and the fee is folded into the
//! same block's coinbase by the caller before `apply_transactions` runs.

use std::collections::HashMap;

use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<String, Amount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, address: &str) -> Amount {
        self.balances.get(address).copied().unwrap_or(Amount::ZERO)
    }

    fn credit(&mut self, address: &str, amount: Amount) -> Result<()> {
        let entry = self.balances.entry(address.to_string()).or_insert(Amount::ZERO);
        *entry = entry.checked_add(amount)?;
        Ok(())
    }

    fn debit(&mut self, address: &str, amount: Amount) -> Result<()> {
        let entry = self.balances.entry(address.to_string()).or_insert(Amount::ZERO);
        *entry = entry.checked_sub(amount)?;
        Ok(())
    }

    /// Applies a block's transactions in order: validates each non-coinbase
    /// transaction against the ledger's *running* balance (so two spends
    /// from the same sender in one block stack correctly), then mutates
    /// balances. The coinbase is credited unconditionally and without
    /// its own signature check (the chain manager verifies its amount
    /// separately against `reward + fees`).
    ///
    /// Validation and mutation happen transaction-by-transaction, so a
    /// failure partway through leaves balances partially applied — callers
    /// must run this against a scratch clone first (see
    /// [`crate::chain::ChainManager`]) and only adopt it once the whole
    /// block has validated.
    pub fn apply_transactions(&mut self, transactions: &[Transaction]) -> Result<()> {
        for (idx, tx) in transactions.iter().enumerate() {
            if idx == 0 && tx.is_coinbase() {
                self.credit(&tx.to_address, tx.amount)?;
                continue;
            }
            if tx.is_coinbase() {
                return Err(Error::BadCoinbaseShape);
            }
            tx.validate(|addr| self.balance(addr))?;
            let required = tx.amount.checked_add(tx.fee)?;
            self.debit(&tx.from_address, required)?;
            self.credit(&tx.to_address, tx.amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{address_from_pub, generate_keypair};

    #[test]
    fn coinbase_credits_recipient_directly() {
        let mut ledger = Ledger::new();
        let coinbase = Transaction::coinbase("miner".into(), Amount::from_coins(50), 1);
        ledger.apply_transactions(&[coinbase]).unwrap();
        assert_eq!(ledger.balance("miner"), Amount::from_coins(50));
    }

    #[test]
    fn transfer_debits_sender_and_credits_recipient() {
        let mut ledger = Ledger::new();
        let keypair = generate_keypair();
        let sender = address_from_pub(&keypair.public_key_bytes());
        let coinbase = Transaction::coinbase(sender.clone(), Amount::from_coins(50), 1);
        let mut transfer = Transaction::new_unsigned(sender.clone(), "bob".into(), Amount::from_coins(10), Amount::from_units(10_000_000), 0);
        transfer.sign(&keypair);
        ledger.apply_transactions(&[coinbase, transfer]).unwrap();
        assert_eq!(ledger.balance(&sender), Amount::from_units(50 * 100_000_000 - 10 * 100_000_000 - 10_000_000));
        assert_eq!(ledger.balance("bob"), Amount::from_coins(10));
    }

    #[test]
    fn rejects_transfer_exceeding_balance() {
        let mut ledger = Ledger::new();
        let keypair = generate_keypair();
        let sender = address_from_pub(&keypair.public_key_bytes());
        let mut transfer = Transaction::new_unsigned(sender, "bob".into(), Amount::from_coins(10), Amount::ZERO, 0);
        transfer.sign(&keypair);
        assert!(matches!(
            ledger.apply_transactions(&[transfer]),
            Err(Error::InsufficientBalance)
        ));
    }

    #[test]
    fn second_coinbase_in_block_is_rejected() {
        let mut ledger = Ledger::new();
        let a = Transaction::coinbase("miner".into(), Amount::from_coins(50), 1);
        let b = Transaction::coinbase("other".into(), Amount::from_coins(50), 1);
        assert!(matches!(
            ledger.apply_transactions(&[a, b]),
            Err(Error::BadCoinbaseShape)
        ));
    }
}
