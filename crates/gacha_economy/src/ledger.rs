//! # Ledger Client
//!
//! The ledger is the system of record for spendable currency. The engine only
//! reads a balance and issues a debit; it never caches either past a request.
//!
//! ## Atomicity
//!
//! A ledger that can perform a conditional decrement ("debit only if the
//! balance covers it") reports [`Ledger::atomic_debit`] as `true`. Ledgers
//! that expose the check and the mutation as separate calls report `false`,
//! and the orchestrator then serialises draws per user around both calls.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::LedgerError;

/// Currency ledger for a user.
pub trait Ledger: Send + Sync {
    /// Current spendable balance of `user_id`.
    fn balance(&self, user_id: &str) -> Result<u64, LedgerError>;

    /// Irreversibly removes `amount` from `user_id`.
    ///
    /// Must fail with [`LedgerError::InsufficientFunds`] rather than drive the
    /// balance negative.
    fn debit(&self, user_id: &str, amount: u64) -> Result<(), LedgerError>;

    /// Whether `debit` checks and decrements in one atomic step.
    fn atomic_debit(&self) -> bool {
        true
    }
}

/// In-process ledger with atomic conditional debits.
///
/// Unknown users have a balance of zero.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: RwLock<HashMap<String, u64>>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger with starting balances.
    #[must_use]
    pub fn with_balances<I, K>(balances: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            balances: RwLock::new(balances.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Adds `amount` to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Rejected`] if the balance would overflow.
    pub fn credit(&self, user_id: &str, amount: u64) -> Result<u64, LedgerError> {
        let mut balances = self.balances.write();
        let balance = balances.entry(user_id.to_owned()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Rejected(format!("balance overflow for {user_id}")))?;
        Ok(*balance)
    }
}

impl Ledger for MemoryLedger {
    fn balance(&self, user_id: &str) -> Result<u64, LedgerError> {
        Ok(self.balances.read().get(user_id).copied().unwrap_or(0))
    }

    fn debit(&self, user_id: &str, amount: u64) -> Result<(), LedgerError> {
        let mut balances = self.balances.write();
        let available = balances.get(user_id).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: Some(available),
            });
        }
        balances.insert(user_id.to_owned(), available - amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_debit_and_balance() {
        let ledger = MemoryLedger::with_balances([("alice", 10)]);
        ledger.debit("alice", 4).unwrap();
        assert_eq!(ledger.balance("alice").unwrap(), 6);
        assert_eq!(ledger.balance("nobody").unwrap(), 0);
        assert!(ledger.atomic_debit());
    }

    #[test]
    fn test_overdraft_rejected_without_change() {
        let ledger = MemoryLedger::with_balances([("alice", 3)]);
        let err = ledger.debit("alice", 4).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                required: 4,
                available: Some(3)
            }
        );
        assert_eq!(ledger.balance("alice").unwrap(), 3);
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let ledger = MemoryLedger::with_balances([("alice", u64::MAX)]);
        assert!(ledger.credit("alice", 1).is_err());
        assert_eq!(ledger.credit("bob", 5).unwrap(), 5);
    }

    #[test]
    fn test_concurrent_debits_never_overspend() {
        let ledger = Arc::new(MemoryLedger::with_balances([("alice", 100)]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    (0..50).filter(|_| ledger.debit("alice", 1).is_ok()).count()
                })
            })
            .collect();

        let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(succeeded, 100);
        assert_eq!(ledger.balance("alice").unwrap(), 0);
    }
}
