//! Datastore boundary.
//!
//! The engines only need a document store that can (a) read documents with a
//! version stamp, (b) answer a handful of equality/ordering queries, and
//! (c) apply a group of writes all-or-nothing. [`Store`] captures exactly that.
//!
//! A [`WriteBatch`] carrying version preconditions behaves as an optimistic
//! transaction: if any expected document was changed or removed since it was
//! read, the whole batch is rejected with [`StoreError::Conflict`]. A batch
//! without preconditions is a plain atomic batched write.

pub mod memory;

use crate::account::{Account, AccountKind};
use crate::ids::{AccountId, MovementId, ProductId, TransactionId};
use crate::movement::Movement;
use crate::product::Product;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors raised by a [`Store`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A precondition failed: the document changed or disappeared after it was read.
    #[error("Concurrent modification of {key}")]
    Conflict { key: DocKey },

    /// The store cannot serve requests (e.g. a poisoned lock).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

/// Address of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKey {
    Account(AccountId),
    Product(ProductId),
    Transaction(TransactionId),
    Movement(MovementId),
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::Account(id) => write!(f, "accounts/{id}"),
            DocKey::Product(id) => write!(f, "products/{id}"),
            DocKey::Transaction(id) => write!(f, "transactions/{id}"),
            DocKey::Movement(id) => write!(f, "movements/{id}"),
        }
    }
}

/// A single write inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutAccount(Account),
    PutProduct(Product),
    PutTransaction(Transaction),
    PutMovement(Movement),
    Delete(DocKey),
}

/// Requirement that a document still exists at the given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precondition {
    pub key: DocKey,
    pub version: u64,
}

/// A unit of work: everything one business operation writes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    preconditions: Vec<Precondition>,
    writes: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `key` to still be at `version` when the batch commits.
    pub fn expect(&mut self, key: DocKey, version: u64) -> &mut Self {
        self.preconditions.push(Precondition { key, version });
        self
    }

    pub fn put_account(&mut self, account: Account) -> &mut Self {
        self.writes.push(WriteOp::PutAccount(account));
        self
    }

    pub fn put_product(&mut self, product: Product) -> &mut Self {
        self.writes.push(WriteOp::PutProduct(product));
        self
    }

    pub fn put_transaction(&mut self, transaction: Transaction) -> &mut Self {
        self.writes.push(WriteOp::PutTransaction(transaction));
        self
    }

    pub fn put_movement(&mut self, movement: Movement) -> &mut Self {
        self.writes.push(WriteOp::PutMovement(movement));
        self
    }

    pub fn delete(&mut self, key: DocKey) -> &mut Self {
        self.writes.push(WriteOp::Delete(key));
        self
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn writes(&self) -> &[WriteOp] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Precondition>, Vec<WriteOp>) {
        (self.preconditions, self.writes)
    }
}

/// The transactional document store the engines run against.
///
/// Every call is one round trip; implementations must make [`Store::commit`]
/// all-or-nothing and must check every precondition before applying any write.
pub trait Store {
    fn account(&self, id: AccountId) -> Result<Option<Versioned<Account>>, StoreError>;

    /// First account of `kind` whose title equals `title` exactly.
    fn account_by_title(
        &self,
        title: &str,
        kind: AccountKind,
    ) -> Result<Option<Versioned<Account>>, StoreError>;

    /// All accounts ordered by title.
    fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    fn product(&self, id: ProductId) -> Result<Option<Versioned<Product>>, StoreError>;

    /// All products ordered by name.
    fn products(&self) -> Result<Vec<Product>, StoreError>;

    fn transaction(&self, id: TransactionId)
        -> Result<Option<Versioned<Transaction>>, StoreError>;

    /// Transactions whose `link` field equals `link`.
    fn transactions_with_link(
        &self,
        link: TransactionId,
    ) -> Result<Vec<Versioned<Transaction>>, StoreError>;

    /// Transactions whose `movement_id` field equals `movement`.
    fn transactions_for_movement(
        &self,
        movement: MovementId,
    ) -> Result<Vec<Versioned<Transaction>>, StoreError>;

    /// Transactions owned by `account`, newest first.
    fn transactions_for_account(&self, account: AccountId)
        -> Result<Vec<Transaction>, StoreError>;

    fn movement(&self, id: MovementId) -> Result<Option<Versioned<Movement>>, StoreError>;

    /// Movements of `product`, newest first.
    fn movements_for_product(&self, product: ProductId) -> Result<Vec<Movement>, StoreError>;

    /// Applies `batch` atomically.
    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
