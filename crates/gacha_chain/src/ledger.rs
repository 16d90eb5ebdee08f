//! # Chain Ledger
//!
//! The game token contract as the draw engine's ledger.
//!
//! ```text
//! balance(user) -> account book -> eth_call balanceOf(address)
//! debit(user)   -> account book -> eth_sendTransaction burn(amount)
//!                               -> poll eth_getTransactionReceipt
//! ```
//!
//! Reading the balance and burning are separate RPCs, so this ledger reports
//! `atomic_debit() == false` and the engine serialises draws per user. Across
//! processes the contract itself refuses an over-burn.
//!
//! Once a burn has been sent, only a revert or a node-side refusal counts as
//! a clean failure. A lost connection or an unreadable answer is reported as
//! [`LedgerError::Indeterminate`] because the burn may still be mined.

use alloy_primitives::Address;
use gacha_economy::{Ledger, LedgerError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::contracts::{decode_balance, encode_balance_of, encode_burn, saturating_u64};
use crate::error::{ChainError, ChainResult};
use crate::rpc::TokenRpc;

/// Maps user ids to token addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountBook {
    accounts: HashMap<String, Address>,
}

impl AccountBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book from `(user_id, "0x...")` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Abi`] naming the first unparsable address.
    pub fn from_hex<I, K, V>(entries: I) -> ChainResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut book = Self::new();
        for (user, address) in entries {
            let user = user.into();
            let parsed = address
                .as_ref()
                .parse::<Address>()
                .map_err(|e| ChainError::Abi(format!("address for {user}: {e}")))?;
            book.insert(user, parsed);
        }
        Ok(book)
    }

    /// Adds or replaces a mapping.
    pub fn insert(&mut self, user_id: impl Into<String>, address: Address) {
        self.accounts.insert(user_id.into(), address);
    }

    /// Address of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::UnknownAccount`].
    pub fn address(&self, user_id: &str) -> ChainResult<Address> {
        self.accounts
            .get(user_id)
            .copied()
            .ok_or_else(|| ChainError::UnknownAccount(user_id.to_owned()))
    }

    /// All mappings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.accounts.iter().map(|(u, a)| (u.as_str(), *a))
    }
}

/// Receipt polling settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiptPolicy {
    /// Delay between receipt lookups.
    pub poll_interval: Duration,
    /// Lookups before the burn is declared indeterminate.
    pub attempts: u32,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            attempts: 60,
        }
    }
}

/// Ledger backed by a burnable token contract.
pub struct ChainLedger {
    rpc: Arc<dyn TokenRpc>,
    contract: Address,
    accounts: AccountBook,
    receipts: ReceiptPolicy,
}

impl ChainLedger {
    /// Creates a ledger for `contract` reached through `rpc`.
    #[must_use]
    pub fn new(rpc: Arc<dyn TokenRpc>, contract: Address, accounts: AccountBook) -> Self {
        Self {
            rpc,
            contract,
            accounts,
            receipts: ReceiptPolicy::default(),
        }
    }

    /// Replaces the receipt polling settings.
    #[must_use]
    pub fn with_receipt_policy(mut self, receipts: ReceiptPolicy) -> Self {
        self.receipts = receipts;
        self
    }

    fn burn(&self, user_id: &str, amount: u64) -> Result<(), LedgerError> {
        let from = self.accounts.address(user_id)?;

        let tx_hash = match self
            .rpc
            .send_transaction(from, self.contract, &encode_burn(amount))
        {
            Ok(hash) => hash,
            Err(ChainError::Reverted(reason)) => {
                tracing::debug!("Burn of {} for {} reverted: {}", amount, user_id, reason);
                return Err(LedgerError::InsufficientFunds {
                    required: amount,
                    available: None,
                });
            }
            // The node answered and refused the transaction.
            Err(e @ (ChainError::Rpc { .. } | ChainError::UnknownAccount(_))) => {
                return Err(e.into())
            }
            // The request may have reached the node.
            Err(e) => {
                return Err(LedgerError::Indeterminate(format!(
                    "burn of {amount} for {user_id} may have been submitted: {e}"
                )))
            }
        };

        for attempt in 0..self.receipts.attempts {
            if attempt > 0 {
                std::thread::sleep(self.receipts.poll_interval);
            }
            match self.rpc.receipt(tx_hash) {
                Ok(Some(receipt)) if receipt.success => {
                    tracing::debug!(
                        "Burn {} for {} mined in block {}",
                        tx_hash,
                        user_id,
                        receipt.block_number
                    );
                    return Ok(());
                }
                Ok(Some(_)) => {
                    return Err(LedgerError::InsufficientFunds {
                        required: amount,
                        available: None,
                    })
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Receipt lookup for {} failed: {}", tx_hash, e),
            }
        }

        Err(LedgerError::Indeterminate(format!(
            "burn {tx_hash} for {user_id} has no receipt after {} lookups",
            self.receipts.attempts
        )))
    }
}

impl Ledger for ChainLedger {
    fn balance(&self, user_id: &str) -> Result<u64, LedgerError> {
        let account = self.accounts.address(user_id)?;
        let ret = self.rpc.call(self.contract, &encode_balance_of(account))?;
        Ok(saturating_u64(decode_balance(&ret)?))
    }

    fn debit(&self, user_id: &str, amount: u64) -> Result<(), LedgerError> {
        self.burn(user_id, amount)
    }

    fn atomic_debit(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for ChainLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainLedger")
            .field("contract", &self.contract)
            .field("accounts", &self.accounts.accounts.len())
            .field("receipts", &self.receipts)
            .finish_non_exhaustive()
    }
}
