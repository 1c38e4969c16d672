//! Movement reversal engine.
//!
//! Undoing a movement works from the product as it is now, not from the
//! snapshots stored on the movement: other movements may have happened in
//! between. Every transaction booked for the movement is deleted and its
//! account corrected, and the movement itself is deleted, in one optimistic
//! commit.

use crate::account::AccountKind;
use crate::amount::Amount;
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, Result};
use crate::ids::{AccountId, MovementId, TransactionId};
use crate::movement::{Direction, Movement};
use crate::product::{Product, StockChange};
use crate::store::{DocKey, Store, Versioned, WriteBatch};
use crate::transaction::Transaction;
use chrono::Utc;
use log::{debug, info};
use std::collections::BTreeMap;

/// Outcome of [`LedgerEngine::reverse_movement`].
#[derive(Debug, Clone, PartialEq)]
pub struct MovementReversal {
    /// The deleted movement as it was stored.
    pub movement: Movement,
    /// Product state after the reversal.
    pub product: Product,
    pub change: StockChange,
    pub deleted_transactions: Vec<TransactionId>,
    /// Balance change applied to each touched account.
    pub adjustments: Vec<(AccountId, Amount)>,
}

impl<S: Store> LedgerEngine<S> {
    /// Reverses one inventory movement.
    ///
    /// An `in` movement takes its quantity and line total back out of stock
    /// and re-averages; the supplier gets the line total back. An `out`
    /// movement puts its quantity back at the current average price, which
    /// stays as it is; the project gets back what it was charged.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the movement, its product or an account
    ///   to be corrected no longer exists
    /// - [`LedgerError::InsufficientStock`] when part of a receipt has already
    ///   been issued, so taking it back would drive the quantity negative
    /// - [`LedgerError::Storage`] on a concurrent change to any record read
    pub fn reverse_movement(&self, id: MovementId) -> Result<MovementReversal> {
        let Versioned {
            version: movement_version,
            doc: movement,
        } = self
            .store
            .movement(id)?
            .ok_or_else(|| LedgerError::not_found("Movement", id))?;
        let Versioned {
            version: product_version,
            doc: mut product,
        } = self.require_product(movement.product_id)?;

        let linked = self.linked_transactions(&movement)?;
        let now = Utc::now();

        let change = match movement.direction {
            Direction::In => product.revert_receipt(movement.quantity, movement.line_total, now)?,
            Direction::Out => product.revert_issue(movement.quantity, now),
        };
        debug!(
            "Reverting {} movement {} of {}: quantity {} -> {}, average {} -> {}",
            movement.direction,
            id,
            product.name,
            change.previous_quantity,
            change.new_quantity,
            change.previous_average,
            change.new_average
        );

        let mut deltas: BTreeMap<AccountId, Amount> = BTreeMap::new();
        for entry in &linked {
            *deltas.entry(entry.doc.account_id).or_default() += entry.doc.reversal_delta();
        }
        // Receipts recorded without a transaction still name who paid. A
        // movement whose transaction was already reversed credits nothing.
        if movement.transaction_id.is_none()
            && linked.is_empty()
            && movement.direction == Direction::In
        {
            if let Some(supplier) = movement.supplier.as_deref() {
                let account = self.require_account_by_title(supplier, AccountKind::Employee)?;
                *deltas.entry(account.doc.id).or_default() += movement.line_total;
            }
        }

        let mut batch = WriteBatch::new();
        batch
            .expect(DocKey::Movement(id), movement_version)
            .expect(DocKey::Product(product.id), product_version)
            .put_product(product.clone());
        for entry in &linked {
            batch
                .expect(DocKey::Transaction(entry.doc.id), entry.version)
                .delete(DocKey::Transaction(entry.doc.id));
        }
        batch.delete(DocKey::Movement(id));
        for (&account_id, &delta) in &deltas {
            let Versioned {
                version,
                doc: mut account,
            } = self.require_account(account_id)?;
            account.apply_delta(delta, now);
            batch
                .expect(DocKey::Account(account_id), version)
                .put_account(account);
        }
        self.store.commit(batch)?;

        let deleted_transactions: Vec<TransactionId> =
            linked.iter().map(|entry| entry.doc.id).collect();
        info!(
            "Reversed {} movement {} of {} ({} transaction(s))",
            movement.direction,
            id,
            product.name,
            deleted_transactions.len()
        );
        Ok(MovementReversal {
            movement,
            product,
            change,
            deleted_transactions,
            adjustments: deltas.into_iter().collect(),
        })
    }

    /// Transactions that point at `movement`, plus the one the movement
    /// points at if that one lacks the back reference.
    fn linked_transactions(&self, movement: &Movement) -> Result<Vec<Versioned<Transaction>>> {
        let mut linked = self.store.transactions_for_movement(movement.id)?;
        if let Some(tx_id) = movement.transaction_id {
            if !linked.iter().any(|entry| entry.doc.id == tx_id) {
                linked.extend(self.store.transaction(tx_id)?);
            }
        }
        Ok(linked)
    }
}
