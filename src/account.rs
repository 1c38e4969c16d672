//! Account ("category") model.
//!
//! An account is a named balance holder: an employee, a project, or the
//! warehouse itself. Its balance must always equal the sum of the amounts of
//! the transactions that reference it and have not been reversed, so it is
//! only ever changed by the engines, together with those transactions.

use crate::amount::Amount;
use crate::codec;
use crate::ids::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier separating employees from projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Staff member; supplies goods on income documents.
    Employee,
    /// Project; consumes goods on expense documents.
    Project,
    /// The warehouse itself; counterparty title on inventory entries.
    Warehouse,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Employee => "employee",
            AccountKind::Project => "project",
            AccountKind::Warehouse => "warehouse",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "employee" => Ok(AccountKind::Employee),
            "project" => Ok(AccountKind::Project),
            "warehouse" => Ok(AccountKind::Warehouse),
            other => Err(format!("unknown account kind: {other}")),
        }
    }
}

/// A balance holder in the fund ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Display title; also the name recorded on transactions and movements.
    pub title: String,

    /// Current signed balance.
    pub balance: Amount,

    pub kind: AccountKind,

    /// Whether the account is shown on the dashboard.
    pub visible: bool,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a visible account with a zero balance.
    pub fn new(title: impl Into<String>, kind: AccountKind) -> Self {
        Account {
            id: AccountId::new(),
            title: title.into(),
            balance: Amount::ZERO,
            kind,
            visible: true,
            updated_at: Utc::now(),
        }
    }

    /// Applies a signed change to the balance.
    pub fn apply_delta(&mut self, delta: Amount, at: DateTime<Utc>) {
        self.balance += delta;
        self.updated_at = at;
    }

    /// The balance as shown to users, sign included.
    pub fn display_balance(&self) -> String {
        codec::format_signed(self.balance)
    }
}
