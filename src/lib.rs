//! # Warehouse Ledger
//!
//! A ledger and inventory consistency engine: money moves between named
//! accounts as linked double-entry pairs, stock moves in and out of the
//! warehouse at moving-average cost, and either kind of change can be
//! reversed exactly.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: money and quantities use 4 decimal places via `rust_decimal`
//! - **One commit per operation**: every operation reads what it needs and
//!   hands all of its writes to the [`Store`] as one [`WriteBatch`]
//! - **Strict invariants**: an account balance equals the sum of its
//!   transactions; `average_purchase_price == total_purchase_price / quantity`
//! - **No hidden retries**: a conflicting commit fails and is reported
//!
//! ## Example
//!
//! ```no_run
//! use warehouse_ledger::{AccountKind, Amount, LedgerEngine, MemoryStore, Product};
//!
//! let engine = LedgerEngine::new(MemoryStore::new());
//! let aidar = engine
//!     .register_account("Aidar", AccountKind::Employee, Amount::from(1000))
//!     .unwrap();
//! let site = engine
//!     .register_account("Site A", AccountKind::Project, Amount::ZERO)
//!     .unwrap();
//! engine
//!     .transfer(aidar.id, site.id, Amount::from(300), "rent", Vec::new(), None)
//!     .unwrap();
//!
//! let cement = engine
//!     .register_product(Product::new("Cement", "Building", "bag"))
//!     .unwrap();
//! engine
//!     .apply_income(cement.id, Amount::from(10), Amount::from(50), "Aidar", None)
//!     .unwrap();
//! engine.write_stock(std::io::stdout()).unwrap();
//! ```

pub mod account;
pub mod amount;
pub mod codec;
pub mod config;
pub mod costing;
pub mod engine;
pub mod error;
pub mod ids;
pub mod movement;
pub mod product;
pub mod report;
pub mod reversal;
pub mod store;
pub mod submission;
pub mod transaction;
pub mod transfer;

pub use account::{Account, AccountKind};
pub use amount::Amount;
pub use config::{EngineConfig, OrphanPolicy};
pub use engine::LedgerEngine;
pub use error::{LedgerError, Result};
pub use ids::{AccountId, MovementId, ProductId, TransactionId};
pub use movement::{Direction, Movement};
pub use product::{Product, StockChange};
pub use report::WarehouseStats;
pub use reversal::MovementReversal;
pub use store::{DocKey, MemoryStore, Store, StoreError, Versioned, WriteBatch};
pub use submission::{Draft, DraftLine, SubmissionReceipt};
pub use transaction::{Attachment, Transaction, TxKind};
pub use transfer::{Reversal, TransferReceipt};
