//! Ledger transfer engine: paired double-entry transfers and their reversal.
//!
//! A transfer writes two transactions whose amounts are exact negatives of
//! each other and whose `link` fields point at each other, and moves both
//! account balances, all in one optimistic commit. Reversal finds the other
//! leg through the link field, deletes both legs and puts both balances back.

use crate::amount::Amount;
use crate::config::OrphanPolicy;
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, Result};
use crate::ids::{AccountId, TransactionId};
use crate::store::{DocKey, Store, Versioned, WriteBatch};
use crate::transaction::{Attachment, Transaction, TxKind};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeMap;

/// Ids of the two legs written by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Leg on the source account (`-amount`).
    pub withdrawal: TransactionId,
    /// Leg on the target account (`+amount`).
    pub deposit: TransactionId,
    pub timestamp: DateTime<Utc>,
}

/// What a transaction reversal removed and corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reversal {
    pub deleted: Vec<TransactionId>,
    /// Balance change applied to each touched account.
    pub adjustments: Vec<(AccountId, Amount)>,
}

impl<S: Store> LedgerEngine<S> {
    /// Moves `amount` from `source` to `target`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if `amount <= 0`, the description is
    ///   blank, or both sides are the same account
    /// - [`LedgerError::NotFound`] if either account is missing
    /// - [`LedgerError::Storage`] if either account changed between the read
    ///   and the commit
    pub fn transfer(
        &self,
        source: AccountId,
        target: AccountId,
        amount: Amount,
        description: &str,
        attachments: Vec<Attachment>,
        salary: Option<bool>,
    ) -> Result<TransferReceipt> {
        if !amount.is_positive() {
            return Err(LedgerError::validation(
                "transfer amount must be greater than zero",
            ));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(LedgerError::validation("transfer needs a description"));
        }
        if source == target {
            return Err(LedgerError::validation(
                "source and target accounts must differ",
            ));
        }

        let Versioned {
            version: source_version,
            doc: mut source_account,
        } = self.require_account(source)?;
        let Versioned {
            version: target_version,
            doc: mut target_account,
        } = self.require_account(target)?;

        // Both ids exist before either leg is built so each can name the other.
        let withdrawal_id = TransactionId::new();
        let deposit_id = TransactionId::new();
        let timestamp = Utc::now();

        let withdrawal = Transaction {
            id: withdrawal_id,
            account_id: source,
            from: source_account.title.clone(),
            to: target_account.title.clone(),
            amount: -amount,
            description: description.to_string(),
            kind: TxKind::Expense,
            timestamp,
            link: Some(deposit_id),
            movement_id: None,
            salary,
            warehouse_operation: false,
            attachments: attachments.clone(),
        };
        let deposit = Transaction {
            id: deposit_id,
            account_id: target,
            amount,
            kind: TxKind::Income,
            link: Some(withdrawal_id),
            attachments,
            ..withdrawal.clone()
        };

        source_account.apply_delta(-amount, timestamp);
        target_account.apply_delta(amount, timestamp);

        let mut batch = WriteBatch::new();
        batch
            .expect(DocKey::Account(source), source_version)
            .expect(DocKey::Account(target), target_version)
            .put_transaction(withdrawal)
            .put_transaction(deposit)
            .put_account(source_account)
            .put_account(target_account);
        self.store.commit(batch)?;

        info!(
            "Transferred {} from {} to {} ({} / {})",
            amount, source, target, withdrawal_id, deposit_id
        );
        Ok(TransferReceipt {
            withdrawal: withdrawal_id,
            deposit: deposit_id,
            timestamp,
        })
    }

    /// Deletes a transaction and, for a transfer leg, its sibling, restoring
    /// the balances of both accounts.
    ///
    /// Transactions without a link (opening balances) are reversed on their
    /// own. Inventory entries are refused; they go with their movement.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if the transaction was booked for an
    ///   inventory movement
    /// - [`LedgerError::NotFound`] if the transaction or an affected account
    ///   is missing, or if the sibling leg is missing under
    ///   [`OrphanPolicy::Abort`]
    /// - [`LedgerError::Storage`] on a concurrent change to any of the records
    pub fn reverse_transaction(&self, id: TransactionId) -> Result<Reversal> {
        let found = self
            .store
            .transaction(id)?
            .ok_or_else(|| LedgerError::not_found("Transaction", id))?;
        if let Some(movement) = found.doc.movement_id {
            return Err(LedgerError::validation(format!(
                "transaction {id} belongs to movement {movement}; reverse the movement instead"
            )));
        }

        let sibling = self.find_sibling(&found.doc)?;
        if found.doc.is_transfer_leg() && sibling.is_none() {
            match self.config.orphan_policy {
                OrphanPolicy::Abort => {
                    return Err(LedgerError::not_found(
                        "Sibling transaction",
                        format!("linked to {id}"),
                    ));
                }
                OrphanPolicy::ReverseFoundLeg => {
                    warn!(
                        "Sibling of transaction {} not found; reversing the found leg only",
                        id
                    );
                }
            }
        }

        let legs: Vec<Versioned<Transaction>> = std::iter::once(found).chain(sibling).collect();

        let mut deltas: BTreeMap<AccountId, Amount> = BTreeMap::new();
        for leg in &legs {
            *deltas.entry(leg.doc.account_id).or_default() += leg.doc.reversal_delta();
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for leg in &legs {
            batch
                .expect(DocKey::Transaction(leg.doc.id), leg.version)
                .delete(DocKey::Transaction(leg.doc.id));
        }
        for (&account_id, &delta) in &deltas {
            let Versioned { version, doc: mut account } = self.require_account(account_id)?;
            account.apply_delta(delta, now);
            batch
                .expect(DocKey::Account(account_id), version)
                .put_account(account);
        }
        self.store.commit(batch)?;

        let deleted: Vec<TransactionId> = legs.iter().map(|leg| leg.doc.id).collect();
        info!("Reversed transaction(s) {:?}", deleted);
        Ok(Reversal {
            deleted,
            adjustments: deltas.into_iter().collect(),
        })
    }

    /// Finds the other leg of a transfer through the link field.
    ///
    /// Mutually linked pairs are found by looking for the entry that links to
    /// `leg`; pairs that share one correlation id are found by looking for
    /// the other entry carrying the same link. `leg` itself is never returned.
    fn find_sibling(&self, leg: &Transaction) -> Result<Option<Versioned<Transaction>>> {
        let Some(link) = leg.link else {
            return Ok(None);
        };

        for key in [leg.id, link] {
            let other = self
                .store
                .transactions_with_link(key)?
                .into_iter()
                .find(|candidate| candidate.doc.id != leg.id);
            if other.is_some() {
                return Ok(other);
            }
        }
        Ok(None)
    }
}
