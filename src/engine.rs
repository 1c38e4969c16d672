//! The ledger and inventory engine facade.
//!
//! [`LedgerEngine`] owns a [`Store`] and the [`EngineConfig`]; the business
//! operations are spread over the `transfer`, `costing`, `reversal`,
//! `submission` and `report` modules as further `impl` blocks.
//!
//! Every operation follows the same unit-of-work shape: read what it needs,
//! compute every derived write up front, then hand them to the store as one
//! [`WriteBatch`]. Nothing is retried here; a failed commit is returned to
//! the caller untouched.

use crate::account::{Account, AccountKind};
use crate::amount::Amount;
use crate::config::EngineConfig;
use crate::error::{LedgerError, Result};
use crate::ids::{AccountId, ProductId, TransactionId};
use crate::product::Product;
use crate::store::{Store, Versioned, WriteBatch};
use crate::transaction::{Transaction, TxKind};
use chrono::Utc;
use log::info;

/// Entry point for every consistency-preserving operation.
pub struct LedgerEngine<S> {
    pub(crate) store: S,
    pub(crate) config: EngineConfig,
}

impl<S: Store> LedgerEngine<S> {
    /// Creates an engine with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        LedgerEngine { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consumes the engine and hands back its store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Creates a new account.
    ///
    /// A non-zero `opening_balance` is booked as a standalone transaction so
    /// that the balance still equals the sum of the account's transactions.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] for an empty title or a title already used
    /// by another account of the same kind.
    pub fn register_account(
        &self,
        title: &str,
        kind: AccountKind,
        opening_balance: Amount,
    ) -> Result<Account> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LedgerError::validation("account title must not be empty"));
        }
        if self.store.account_by_title(title, kind)?.is_some() {
            return Err(LedgerError::validation(format!(
                "a {kind} account titled {title:?} already exists"
            )));
        }

        let now = Utc::now();
        let mut account = Account::new(title, kind);
        let mut batch = WriteBatch::new();

        if !opening_balance.is_zero() {
            account.apply_delta(opening_balance, now);
            batch.put_transaction(Transaction {
                id: TransactionId::new(),
                account_id: account.id,
                from: title.to_string(),
                to: title.to_string(),
                amount: opening_balance,
                description: "Opening balance".to_string(),
                kind: if opening_balance.is_negative() {
                    TxKind::Expense
                } else {
                    TxKind::Income
                },
                timestamp: now,
                link: None,
                movement_id: None,
                salary: None,
                warehouse_operation: false,
                attachments: Vec::new(),
            });
        }
        batch.put_account(account.clone());
        self.store.commit(batch)?;

        info!("Registered {} account {:?} ({})", kind, title, account.id);
        Ok(account)
    }

    /// Adds a product to the catalog.
    ///
    /// Products enter the catalog empty; stock and cost basis only ever change
    /// through movements.
    pub fn register_product(&self, product: Product) -> Result<Product> {
        if product.name.trim().is_empty() {
            return Err(LedgerError::validation("product name must not be empty"));
        }
        if !product.quantity.is_zero() || !product.total_purchase_price.is_zero() {
            return Err(LedgerError::validation(
                "new products start with zero stock; receive goods with an income document",
            ));
        }
        if product.min_quantity.is_negative() {
            return Err(LedgerError::validation(
                "minimum quantity must not be negative",
            ));
        }
        if self.find_product(&product.name)?.is_some() {
            return Err(LedgerError::validation(format!(
                "a product named {:?} already exists",
                product.name
            )));
        }

        let mut batch = WriteBatch::new();
        batch.put_product(product.clone());
        self.store.commit(batch)?;

        info!("Registered product {:?} ({})", product.name, product.id);
        Ok(product)
    }

    /// Reads an account or fails with `NotFound`.
    pub(crate) fn require_account(&self, id: AccountId) -> Result<Versioned<Account>> {
        self.store
            .account(id)?
            .ok_or_else(|| LedgerError::not_found("Account", id))
    }

    pub(crate) fn require_account_by_title(
        &self,
        title: &str,
        kind: AccountKind,
    ) -> Result<Versioned<Account>> {
        self.store
            .account_by_title(title, kind)?
            .ok_or_else(|| LedgerError::not_found("Account", format!("{kind} {title:?}")))
    }

    /// Reads a product or fails with `NotFound`.
    pub(crate) fn require_product(&self, id: ProductId) -> Result<Versioned<Product>> {
        self.store
            .product(id)?
            .ok_or_else(|| LedgerError::not_found("Product", id))
    }

    /// Looks an account up by title across all kinds.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] when accounts of different kinds share the
    /// title; such accounts have to be addressed by id.
    pub fn find_account(&self, title: &str) -> Result<Option<Account>> {
        let title = title.trim();
        let mut matches = self
            .store
            .accounts()?
            .into_iter()
            .filter(|a| a.title == title);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(LedgerError::validation(format!(
                "several accounts are titled {title:?}; use the account id"
            )));
        }
        Ok(first)
    }

    /// Looks a product up by exact name.
    pub fn find_product(&self, name: &str) -> Result<Option<Product>> {
        let name = name.trim();
        Ok(self
            .store
            .products()?
            .into_iter()
            .find(|p| p.name == name))
    }
}
