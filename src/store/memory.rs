//! In-process [`Store`] implementation.
//!
//! Documents live in hash maps behind an `RwLock`. Every put stamps the
//! document with a fresh, store-wide version so that a precondition can never
//! match a document that was deleted and recreated in between. The whole
//! store can be persisted to, and reloaded from, a JSON snapshot file.

use super::{DocKey, Precondition, Store, StoreError, Versioned, WriteBatch, WriteOp};
use crate::account::{Account, AccountKind};
use crate::ids::{AccountId, MovementId, ProductId, TransactionId};
use crate::movement::Movement;
use crate::product::Product;
use crate::transaction::Transaction;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Documents>,
}

#[derive(Debug, Default)]
struct Documents {
    last_version: u64,
    accounts: HashMap<AccountId, Versioned<Account>>,
    products: HashMap<ProductId, Versioned<Product>>,
    transactions: HashMap<TransactionId, Versioned<Transaction>>,
    movements: HashMap<MovementId, Versioned<Movement>>,
}

/// On-disk form of a [`MemoryStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    last_version: u64,
    accounts: Vec<Versioned<Account>>,
    products: Vec<Versioned<Product>>,
    transactions: Vec<Versioned<Transaction>>,
    movements: Vec<Versioned<Movement>>,
}

impl Documents {
    fn version_of(&self, key: DocKey) -> Option<u64> {
        match key {
            DocKey::Account(id) => self.accounts.get(&id).map(|v| v.version),
            DocKey::Product(id) => self.products.get(&id).map(|v| v.version),
            DocKey::Transaction(id) => self.transactions.get(&id).map(|v| v.version),
            DocKey::Movement(id) => self.movements.get(&id).map(|v| v.version),
        }
    }

    fn check(&self, precondition: &Precondition) -> Result<(), StoreError> {
        if self.version_of(precondition.key) == Some(precondition.version) {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                key: precondition.key,
            })
        }
    }

    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutAccount(doc) => {
                let version = self.next_version();
                self.accounts.insert(doc.id, Versioned { version, doc });
            }
            WriteOp::PutProduct(doc) => {
                let version = self.next_version();
                self.products.insert(doc.id, Versioned { version, doc });
            }
            WriteOp::PutTransaction(doc) => {
                let version = self.next_version();
                self.transactions.insert(doc.id, Versioned { version, doc });
            }
            WriteOp::PutMovement(doc) => {
                let version = self.next_version();
                self.movements.insert(doc.id, Versioned { version, doc });
            }
            WriteOp::Delete(DocKey::Account(id)) => {
                self.accounts.remove(&id);
            }
            WriteOp::Delete(DocKey::Product(id)) => {
                self.products.remove(&id);
            }
            WriteOp::Delete(DocKey::Transaction(id)) => {
                self.transactions.remove(&id);
            }
            WriteOp::Delete(DocKey::Movement(id)) => {
                self.movements.remove(&id);
            }
        }
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a JSON snapshot. A missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = match fs::read(path.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}, starting empty", path.as_ref().display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        let docs = Documents {
            last_version: snapshot.last_version,
            accounts: snapshot
                .accounts
                .into_iter()
                .map(|v| (v.doc.id, v))
                .collect(),
            products: snapshot
                .products
                .into_iter()
                .map(|v| (v.doc.id, v))
                .collect(),
            transactions: snapshot
                .transactions
                .into_iter()
                .map(|v| (v.doc.id, v))
                .collect(),
            movements: snapshot
                .movements
                .into_iter()
                .map(|v| (v.doc.id, v))
                .collect(),
        };

        Ok(MemoryStore {
            inner: RwLock::new(docs),
        })
    }

    /// Writes the whole store to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let docs = self.read()?;
        let mut snapshot = Snapshot {
            last_version: docs.last_version,
            accounts: docs.accounts.values().cloned().collect(),
            products: docs.products.values().cloned().collect(),
            transactions: docs.transactions.values().cloned().collect(),
            movements: docs.movements.values().cloned().collect(),
        };
        // Deterministic order on disk.
        snapshot.accounts.sort_by_key(|v| v.doc.id);
        snapshot.products.sort_by_key(|v| v.doc.id);
        snapshot.transactions.sort_by_key(|v| v.doc.id);
        snapshot.movements.sort_by_key(|v| v.doc.id);

        fs::write(path, serde_json::to_vec_pretty(&snapshot)?)?;
        Ok(())
    }

    /// Every transaction in the store, newest first.
    pub fn transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let docs = self.read()?;
        let mut all: Vec<Transaction> = docs.transactions.values().map(|v| v.doc.clone()).collect();
        sort_newest_first(&mut all, |t| (t.timestamp, t.id));
        Ok(all)
    }

    pub fn movement_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.movements.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Documents>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Documents>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

fn sort_newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl Store for MemoryStore {
    fn account(&self, id: AccountId) -> Result<Option<Versioned<Account>>, StoreError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn account_by_title(
        &self,
        title: &str,
        kind: AccountKind,
    ) -> Result<Option<Versioned<Account>>, StoreError> {
        let docs = self.read()?;
        let mut matches: Vec<&Versioned<Account>> = docs
            .accounts
            .values()
            .filter(|v| v.doc.kind == kind && v.doc.title == title)
            .collect();
        matches.sort_by_key(|v| v.doc.id);
        Ok(matches.first().map(|v| (*v).clone()))
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let docs = self.read()?;
        let mut all: Vec<Account> = docs.accounts.values().map(|v| v.doc.clone()).collect();
        all.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn product(&self, id: ProductId) -> Result<Option<Versioned<Product>>, StoreError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        let docs = self.read()?;
        let mut all: Vec<Product> = docs.products.values().map(|v| v.doc.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Versioned<Transaction>>, StoreError> {
        Ok(self.read()?.transactions.get(&id).cloned())
    }

    fn transactions_with_link(
        &self,
        link: TransactionId,
    ) -> Result<Vec<Versioned<Transaction>>, StoreError> {
        let docs = self.read()?;
        let mut found: Vec<Versioned<Transaction>> = docs
            .transactions
            .values()
            .filter(|v| v.doc.link == Some(link))
            .cloned()
            .collect();
        found.sort_by_key(|v| v.doc.id);
        Ok(found)
    }

    fn transactions_for_movement(
        &self,
        movement: MovementId,
    ) -> Result<Vec<Versioned<Transaction>>, StoreError> {
        let docs = self.read()?;
        let mut found: Vec<Versioned<Transaction>> = docs
            .transactions
            .values()
            .filter(|v| v.doc.movement_id == Some(movement))
            .cloned()
            .collect();
        found.sort_by_key(|v| v.doc.id);
        Ok(found)
    }

    fn transactions_for_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let docs = self.read()?;
        let mut found: Vec<Transaction> = docs
            .transactions
            .values()
            .filter(|v| v.doc.account_id == account)
            .map(|v| v.doc.clone())
            .collect();
        sort_newest_first(&mut found, |t| (t.timestamp, t.id));
        Ok(found)
    }

    fn movement(&self, id: MovementId) -> Result<Option<Versioned<Movement>>, StoreError> {
        Ok(self.read()?.movements.get(&id).cloned())
    }

    fn movements_for_product(&self, product: ProductId) -> Result<Vec<Movement>, StoreError> {
        let docs = self.read()?;
        let mut found: Vec<Movement> = docs
            .movements
            .values()
            .filter(|v| v.doc.product_id == product)
            .map(|v| v.doc.clone())
            .collect();
        sort_newest_first(&mut found, |m| (m.timestamp, m.id));
        Ok(found)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let (preconditions, writes) = batch.into_parts();
        let mut docs = self.write()?;

        for precondition in &preconditions {
            docs.check(precondition)?;
        }

        let count = writes.len();
        for op in writes {
            docs.apply(op);
        }
        debug!(
            "Committed {} writes under {} preconditions",
            count,
            preconditions.len()
        );
        Ok(())
    }
}
