//! # Token Simulator
//!
//! An in-process game token that answers the same ABI calldata as the real
//! contract. Each accepted transaction is mined into its own block at once.
//!
//! Used for development (`ledger.kind = "simulated"`) and tests. Faults can be
//! injected to exercise the ledger's error paths without a node.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolCall;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::contracts::{encode_uint_return, selector, IGameToken};
use crate::error::{ChainError, ChainResult};
use crate::rpc::{Receipt, TokenRpc};

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, U256>,
    receipts: HashMap<B256, Receipt>,
    block_number: u64,
    tx_count: u64,
    burned: U256,
}

#[derive(Debug, Default)]
struct Faults {
    next_send: Option<ChainError>,
    withhold_receipts: bool,
}

/// Simulated burnable token.
#[derive(Debug, Default)]
pub struct SimulatedToken {
    state: Mutex<TokenState>,
    faults: Mutex<Faults>,
}

impl SimulatedToken {
    /// Creates a token with no holders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `account`.
    pub fn mint(&self, account: Address, amount: u64) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(U256::from(amount));
    }

    /// Balance of `account`.
    #[must_use]
    pub fn balance_of(&self, account: Address) -> U256 {
        self.state
            .lock()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    /// Total burned so far.
    #[must_use]
    pub fn burned(&self) -> U256 {
        self.state.lock().burned
    }

    /// Transactions accepted so far.
    #[must_use]
    pub fn tx_count(&self) -> u64 {
        self.state.lock().tx_count
    }

    /// Fails the next `send_transaction` with `error`, without applying it.
    pub fn fail_next_send(&self, error: ChainError) {
        self.faults.lock().next_send = Some(error);
    }

    /// Applies transactions but never reports their receipts.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.faults.lock().withhold_receipts = withhold;
    }

    fn total_supply(state: &TokenState) -> U256 {
        state
            .balances
            .values()
            .fold(U256::ZERO, |acc, b| acc.saturating_add(*b))
    }
}

impl TokenRpc for SimulatedToken {
    fn call(&self, _to: Address, data: &[u8]) -> ChainResult<Vec<u8>> {
        let state = self.state.lock();
        match selector(data)? {
            IGameToken::balanceOfCall::SELECTOR => {
                let call = IGameToken::balanceOfCall::abi_decode(data, true)?;
                let balance = state.balances.get(&call.account).copied().unwrap_or_default();
                Ok(encode_uint_return(balance))
            }
            IGameToken::totalSupplyCall::SELECTOR => {
                Ok(encode_uint_return(Self::total_supply(&state)))
            }
            _ => Err(ChainError::Abi("eth_call on a mutating function".to_string())),
        }
    }

    fn send_transaction(&self, from: Address, _to: Address, data: &[u8]) -> ChainResult<B256> {
        if let Some(error) = self.faults.lock().next_send.take() {
            return Err(error);
        }

        if selector(data)? != IGameToken::burnCall::SELECTOR {
            return Err(ChainError::Abi("only burn can be sent".to_string()));
        }
        let call = IGameToken::burnCall::abi_decode(data, true)?;

        let mut state = self.state.lock();
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < call.amount {
            // Nodes reject this at gas estimation, before it is mined.
            return Err(ChainError::Reverted(
                "ERC20: burn amount exceeds balance".to_string(),
            ));
        }

        state.balances.insert(from, balance - call.amount);
        state.burned = state.burned.saturating_add(call.amount);
        state.block_number += 1;
        state.tx_count += 1;

        let mut preimage = Vec::with_capacity(20 + 8);
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&state.tx_count.to_be_bytes());
        let tx_hash = keccak256(&preimage);

        if !self.faults.lock().withhold_receipts {
            let block_number = state.block_number;
            state.receipts.insert(
                tx_hash,
                Receipt {
                    success: true,
                    block_number,
                },
            );
        }

        tracing::debug!("Simulated burn of {} from {}", call.amount, from);
        Ok(tx_hash)
    }

    fn receipt(&self, tx_hash: B256) -> ChainResult<Option<Receipt>> {
        Ok(self.state.lock().receipts.get(&tx_hash).copied())
    }
}
