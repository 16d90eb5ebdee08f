//! Assembles a [`DrawEngine`] from configuration.
//!
//! Must run outside the async runtime: the chain ledger owns a blocking HTTP
//! client.

use alloy_primitives::{keccak256, Address};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use gacha_chain::{AccountBook, ChainLedger, HttpRpc, ReceiptPolicy, SimulatedToken, TokenRpc};
use gacha_economy::{
    DrawEngine, JournalOwnershipStore, Ledger, MemoryLedger, MemoryOwnershipStore,
    OwnershipStore, StaticCatalog,
};

use crate::config::{GachaConfig, LedgerConfig, StoreConfig};
use crate::errors::StartupError;

/// Builds the engine described by `config`.
///
/// # Errors
///
/// Fails if the signing key, catalog, store or ledger cannot be set up.
pub fn build_engine(config: &GachaConfig) -> Result<DrawEngine, StartupError> {
    let auth = config.auth.authenticator()?;
    let catalog = StaticCatalog::from_path(&config.catalog.path)?;
    let store = build_store(&config.store)?;
    let ledger = build_ledger(&config.ledger)?;

    Ok(
        DrawEngine::new(Arc::new(auth), Arc::new(catalog), ledger, store)
            .with_config(config.draw.draw_config()),
    )
}

fn build_store(config: &StoreConfig) -> Result<Arc<dyn OwnershipStore>, StartupError> {
    match &config.journal_path {
        Some(path) => {
            let store = JournalOwnershipStore::open(path)?;
            let stats = store.stats();
            tracing::info!(
                "Ownership journal {} ({} batches, {} records)",
                path.display(),
                stats.batches,
                stats.records
            );
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("No journal configured; ownership records are lost on exit");
            Ok(Arc::new(MemoryOwnershipStore::new()))
        }
    }
}

fn build_ledger(config: &LedgerConfig) -> Result<Arc<dyn Ledger>, StartupError> {
    match config {
        LedgerConfig::Memory { balances } => Ok(Arc::new(MemoryLedger::with_balances(
            balances.iter().map(|(user, amount)| (user.clone(), *amount)),
        ))),
        LedgerConfig::Simulated { accounts, mint } => {
            let book = simulated_accounts(accounts, mint)?;
            let token = Arc::new(SimulatedToken::new());
            for (user, amount) in mint {
                token.mint(book.address(user)?, *amount);
            }
            // The simulator answers for any contract address.
            Ok(Arc::new(ChainLedger::new(token, Address::ZERO, book)))
        }
        LedgerConfig::Chain {
            rpc_url,
            contract,
            accounts,
            receipt_poll_ms,
            receipt_attempts,
            request_timeout_ms,
        } => {
            let contract: Address = contract
                .parse()
                .map_err(|e| StartupError::Config(format!("ledger: contract {contract:?}: {e}")))?;
            let book = AccountBook::from_hex(accounts.iter().map(|(u, a)| (u.clone(), a)))?;
            let rpc: Arc<dyn TokenRpc> = Arc::new(HttpRpc::new(
                rpc_url.clone(),
                Duration::from_millis(*request_timeout_ms),
            )?);
            tracing::info!(
                "Chain ledger: contract {} via {} ({} accounts)",
                contract,
                rpc_url,
                accounts.len()
            );
            Ok(Arc::new(ChainLedger::new(rpc, contract, book).with_receipt_policy(
                ReceiptPolicy {
                    poll_interval: Duration::from_millis(*receipt_poll_ms),
                    attempts: *receipt_attempts,
                },
            )))
        }
    }
}

/// Explicit accounts, plus an address derived from the user id for anyone
/// who is only minted to.
fn simulated_accounts(
    accounts: &BTreeMap<String, String>,
    mint: &BTreeMap<String, u64>,
) -> Result<AccountBook, StartupError> {
    let mut book = AccountBook::from_hex(accounts.iter().map(|(u, a)| (u.clone(), a)))?;
    for user in mint.keys() {
        if !accounts.contains_key(user) {
            book.insert(user.clone(), Address::from_word(keccak256(user.as_bytes())));
        }
    }
    Ok(book)
}
