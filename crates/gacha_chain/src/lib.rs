//! # Gacha Chain Ledger
//!
//! The game token contract as the draw engine's currency ledger.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   Ledger    ┌─────────────────┐  TokenRpc  ┌─────────────────┐
//! │  DrawEngine     │ ──────────▶ │  ChainLedger    │ ─────────▶ │  HttpRpc        │ ──▶ node
//! │  (economy)      │             │  (account book) │            │  SimulatedToken │
//! └─────────────────┘             └─────────────────┘            └─────────────────┘
//! ```
//!
//! Balance reads and burns are separate RPCs; a burn is only reported as done
//! once its receipt is seen.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contracts;
pub mod error;
pub mod ledger;
pub mod rpc;
pub mod simulator;

pub use error::{ChainError, ChainResult};
pub use ledger::{AccountBook, ChainLedger, ReceiptPolicy};
pub use rpc::{HttpRpc, Receipt, TokenRpc};
pub use simulator::SimulatedToken;
