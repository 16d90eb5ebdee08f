//! # Gacha Economy
//!
//! The draw engine: users spend currency for weighted random draws from a
//! character catalog, and every paid draw becomes a durable ownership record.
//!
//! ## Design Principles
//!
//! 1. **Spend before draw** - Currency leaves the ledger before anything is selected
//! 2. **No lost draws** - After the debit, every result is persisted or the failure is surfaced for reconciliation
//! 3. **Bounded writes** - Ownership records stream to storage in fixed-size batches
//! 4. **External configuration** - Catalogs are TOML data, not code
//!
//! ## Collaborators
//!
//! Authentication, catalogs, the ledger and the ownership store are traits.
//! In-process implementations ship here; the on-chain ledger lives in
//! `gacha_chain`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use gacha_economy::{DrawEngine, DrawParams, StaticCatalog, MemoryLedger};
//!
//! let engine = DrawEngine::new(auth, catalog, ledger, store);
//! let result = engine.draw(DrawParams { gacha_id: 1, times: 10 }, Some(&token))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod batch;
pub mod catalog;
pub mod draw;
pub mod entropy;
pub mod error;
pub mod inventory;
pub mod journal;
pub mod ledger;
pub mod ownership;
pub mod selector;

pub use auth::{Authenticator, TokenAuthenticator, UserId};
pub use batch::{BatchStats, OwnershipBatcher, DEFAULT_BATCH_SIZE};
pub use catalog::{CatalogEntry, CatalogProvider, EntryId, GachaId, StaticCatalog};
pub use draw::{
    DrawConfig, DrawEngine, DrawParams, DrawRequest, DrawResult, DrawnCharacter, UserLease,
    UserLeases,
};
pub use entropy::{EntropySource, OsEntropy, SeededEntropy};
pub use error::{
    AuthError, CatalogError, DrawError, EconomyResult, ErrorCode, LedgerError, LedgerStep,
    SelectError, StoreError,
};
pub use inventory::OwnedCharacter;
pub use journal::JournalOwnershipStore;
pub use ledger::{Ledger, MemoryLedger};
pub use ownership::{MemoryOwnershipStore, OwnershipRecord, OwnershipStore, StoreStats};
pub use selector::{select, WeightedSelector};
