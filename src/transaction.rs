//! Transaction model: one leg of a transfer, or the monetary side of an
//! inventory movement.
//!
//! Transactions are facts. They are created by the transfer engine or the
//! batch coordinator and deleted (with compensation) by the reversal flows;
//! they are never edited in place.

use crate::amount::Amount;
use crate::ids::{AccountId, MovementId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a leg from the owning account's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// Money arrives on the account (`amount > 0`).
    Income,
    /// Money leaves the account (`amount < 0`).
    Expense,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Income => f.write_str("income"),
            TxKind::Expense => f.write_str("expense"),
        }
    }
}

/// Reference to a file uploaded to the object store.
///
/// The engines copy these onto transactions verbatim and never look at the
/// bytes behind `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Object store path the file was uploaded to.
    pub path: String,
}

/// One ledger entry on one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Account whose balance this entry moved.
    pub account_id: AccountId,

    /// Display name of the paying side.
    pub from: String,

    /// Display name of the receiving side.
    pub to: String,

    /// Signed amount; negative is an outflow.
    pub amount: Amount,

    pub description: String,

    pub kind: TxKind,

    pub timestamp: DateTime<Utc>,

    /// The other leg of a transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<TransactionId>,

    /// The inventory movement that produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_id: Option<MovementId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<bool>,

    /// Set on entries written by warehouse expense documents.
    #[serde(default)]
    pub warehouse_operation: bool,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Transaction {
    /// Balance change that undoes this entry on its account.
    ///
    /// An expense leg is undone by adding back its magnitude, an income leg
    /// by subtracting its amount.
    pub fn reversal_delta(&self) -> Amount {
        match self.kind {
            TxKind::Expense => self.amount.abs(),
            TxKind::Income => -self.amount,
        }
    }

    /// Whether this entry is one leg of a transfer pair.
    pub fn is_transfer_leg(&self) -> bool {
        self.link.is_some()
    }
}
