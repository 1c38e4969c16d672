//! Inventory movement records.
//!
//! A movement is the audit trail of one stock change. Its before/after
//! snapshots are written once and never updated, even after the product's
//! live fields move on.

use crate::amount::Amount;
use crate::ids::{MovementId, ProductId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Goods received into the warehouse.
    In,
    /// Goods issued out of the warehouse.
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("in"),
            Direction::Out => f.write_str("out"),
        }
    }
}

/// One committed inventory change for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub direction: Direction,
    pub quantity: Amount,

    /// Purchase price for receipts; average price at the time of issue for
    /// expenses.
    pub unit_price: Amount,

    /// `quantity × unit_price`.
    pub line_total: Amount,

    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub warehouse: String,

    pub previous_quantity: Amount,
    pub new_quantity: Amount,
    pub previous_average_price: Amount,
    pub new_average_price: Amount,

    /// Title of the supplying employee account (receipts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    /// Transaction recorded for this movement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
}
