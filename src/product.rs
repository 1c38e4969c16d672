//! Product model and moving-average costing arithmetic.
//!
//! # Invariants
//!
//! - `average_purchase_price == total_purchase_price / quantity` (to 4 places)
//!   whenever `quantity > 0`
//! - Receipts re-average; issues never change the average
//! - `quantity` never goes negative
//!
//! When a change drives the quantity to zero the cost basis is cleared, and a
//! receipt reversal defines the average as zero rather than `0 / 0`.

use crate::amount::Amount;
use crate::error::{LedgerError, Result};
use crate::ids::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stock-keeping unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,

    /// Catalog category label (free text).
    pub category: String,

    /// Quantity on hand.
    pub quantity: Amount,

    /// Threshold at or below which the product counts as low on stock.
    pub min_quantity: Amount,

    pub average_purchase_price: Amount,

    /// Running cost basis of the quantity on hand.
    pub total_purchase_price: Amount,

    /// Unit of measure ("pcs", "kg", ...).
    pub unit: String,

    /// Folder/location the product is filed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quantity and average price before and after one costing step.
///
/// These become the immutable snapshots of the movement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub previous_quantity: Amount,
    pub new_quantity: Amount,
    pub previous_average: Amount,
    pub new_average: Amount,
}

impl Product {
    /// Creates an empty product with no stock and no cost basis.
    pub fn new(name: impl Into<String>, category: impl Into<String>, unit: impl Into<String>) -> Self {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            name: name.into(),
            category: category.into(),
            quantity: Amount::ZERO,
            min_quantity: Amount::ZERO,
            average_purchase_price: Amount::ZERO,
            total_purchase_price: Amount::ZERO,
            unit: unit.into(),
            folder_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Receives `quantity` units bought at `unit_price` and re-averages.
    ///
    /// The caller guarantees `quantity > 0`.
    pub fn receive(&mut self, quantity: Amount, unit_price: Amount, at: DateTime<Utc>) -> StockChange {
        let previous_quantity = self.quantity;
        let previous_average = self.average_purchase_price;

        self.quantity += quantity;
        self.total_purchase_price += quantity * unit_price;
        self.average_purchase_price = self
            .total_purchase_price
            .checked_div(self.quantity)
            .unwrap_or(Amount::ZERO);
        self.updated_at = at;

        StockChange {
            previous_quantity,
            new_quantity: self.quantity,
            previous_average,
            new_average: self.average_purchase_price,
        }
    }

    /// Issues `quantity` units at the current average price.
    ///
    /// The cost basis shrinks by `quantity × average` so the average itself
    /// stays put; it is reset to zero once the shelf is empty.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientStock`] if `quantity` exceeds the quantity on
    /// hand. The product is left untouched in that case.
    pub fn issue(&mut self, quantity: Amount, at: DateTime<Utc>) -> Result<StockChange> {
        if quantity > self.quantity {
            return Err(LedgerError::InsufficientStock {
                product: self.name.clone(),
                requested: quantity,
                available: self.quantity,
            });
        }

        let previous_quantity = self.quantity;
        self.quantity -= quantity;
        if self.quantity.is_zero() {
            self.total_purchase_price = Amount::ZERO;
        } else {
            self.total_purchase_price -= quantity * self.average_purchase_price;
        }
        self.updated_at = at;

        Ok(StockChange {
            previous_quantity,
            new_quantity: self.quantity,
            previous_average: self.average_purchase_price,
            new_average: self.average_purchase_price,
        })
    }

    /// Undoes a receipt of `quantity` units that contributed `line_total` to
    /// the cost basis.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientStock`] if part of the received goods has
    /// already left the warehouse, so that the quantity would go negative.
    pub fn revert_receipt(&mut self, quantity: Amount, line_total: Amount, at: DateTime<Utc>) -> Result<StockChange> {
        if quantity > self.quantity {
            return Err(LedgerError::InsufficientStock {
                product: self.name.clone(),
                requested: quantity,
                available: self.quantity,
            });
        }

        let previous_quantity = self.quantity;
        let previous_average = self.average_purchase_price;

        self.quantity -= quantity;
        self.total_purchase_price -= line_total;
        if self.quantity.is_positive() {
            self.average_purchase_price = self
                .total_purchase_price
                .checked_div(self.quantity)
                .unwrap_or(Amount::ZERO);
        } else {
            self.total_purchase_price = Amount::ZERO;
            self.average_purchase_price = Amount::ZERO;
        }
        self.updated_at = at;

        Ok(StockChange {
            previous_quantity,
            new_quantity: self.quantity,
            previous_average,
            new_average: self.average_purchase_price,
        })
    }

    /// Puts `quantity` issued units back on the shelf at the current average.
    pub fn revert_issue(&mut self, quantity: Amount, at: DateTime<Utc>) -> StockChange {
        let previous_quantity = self.quantity;
        self.quantity += quantity;
        self.total_purchase_price += quantity * self.average_purchase_price;
        self.updated_at = at;

        StockChange {
            previous_quantity,
            new_quantity: self.quantity,
            previous_average: self.average_purchase_price,
            new_average: self.average_purchase_price,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }

    /// Value of the stock on hand at the average purchase price.
    pub fn stock_value(&self) -> Amount {
        self.quantity * self.average_purchase_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amt(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    fn product() -> Product {
        Product::new("Cement M400", "Building", "bag")
    }

    #[test]
    fn test_receive_into_empty_stock() {
        let mut p = product();
        let change = p.receive(Amount::from(10), Amount::from(50), Utc::now());

        assert_eq!(p.quantity, Amount::from(10));
        assert_eq!(p.average_purchase_price, Amount::from(50));
        assert_eq!(p.total_purchase_price, Amount::from(500));
        assert_eq!(change.previous_quantity, Amount::ZERO);
        assert_eq!(change.previous_average, Amount::ZERO);
        assert_eq!(change.new_average, Amount::from(50));
    }

    #[test]
    fn test_receive_reaverages() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        let change = p.receive(Amount::from(10), Amount::from(70), Utc::now());

        assert_eq!(p.quantity, Amount::from(20));
        assert_eq!(p.average_purchase_price, Amount::from(60));
        assert_eq!(p.total_purchase_price, Amount::from(1200));
        assert_eq!(change.previous_average, Amount::from(50));
    }

    #[test]
    fn test_receive_non_terminating_average_rounds() {
        let mut p = product();
        p.receive(Amount::from(3), Amount::from(10), Utc::now());
        p.receive(Amount::from(3), Amount::from(11), Utc::now());
        p.receive(Amount::from(3), Amount::from(11), Utc::now());
        assert_eq!(p.average_purchase_price, amt("10.6667"));
    }

    #[test]
    fn test_issue_keeps_average() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        let change = p.issue(Amount::from(4), Utc::now()).unwrap();

        assert_eq!(p.quantity, Amount::from(6));
        assert_eq!(p.average_purchase_price, Amount::from(50));
        assert_eq!(p.total_purchase_price, Amount::from(300));
        assert_eq!(change.previous_quantity, Amount::from(10));
        assert_eq!(change.new_quantity, Amount::from(6));
    }

    #[test]
    fn test_issue_more_than_on_hand_is_rejected() {
        let mut p = product();
        p.receive(Amount::from(5), Amount::from(50), Utc::now());
        let before = p.clone();

        let err = p.issue(Amount::from(10), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
        assert_eq!(p, before);
    }

    #[test]
    fn test_issue_everything_clears_cost_basis() {
        let mut p = product();
        p.receive(Amount::from(3), Amount::from(10), Utc::now());
        p.receive(Amount::from(3), Amount::from(11), Utc::now());
        p.issue(Amount::from(6), Utc::now()).unwrap();

        assert_eq!(p.quantity, Amount::ZERO);
        assert_eq!(p.total_purchase_price, Amount::ZERO);
    }

    #[test]
    fn test_revert_receipt_restores_previous_average() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        p.receive(Amount::from(10), Amount::from(70), Utc::now());

        p.revert_receipt(Amount::from(10), Amount::from(700), Utc::now())
            .unwrap();
        assert_eq!(p.quantity, Amount::from(10));
        assert_eq!(p.average_purchase_price, Amount::from(50));
        assert_eq!(p.total_purchase_price, Amount::from(500));
    }

    #[test]
    fn test_revert_receipt_to_zero_defines_average_as_zero() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        let change = p
            .revert_receipt(Amount::from(10), Amount::from(500), Utc::now())
            .unwrap();

        assert_eq!(p.quantity, Amount::ZERO);
        assert_eq!(p.average_purchase_price, Amount::ZERO);
        assert_eq!(p.total_purchase_price, Amount::ZERO);
        assert_eq!(change.new_average, Amount::ZERO);
    }

    #[test]
    fn test_revert_receipt_to_zero_after_issue_clears_cost_basis() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        p.receive(Amount::from(10), Amount::from(70), Utc::now());
        p.issue(Amount::from(10), Utc::now()).unwrap();

        p.revert_receipt(Amount::from(10), Amount::from(700), Utc::now())
            .unwrap();
        assert_eq!(p.quantity, Amount::ZERO);
        assert_eq!(p.average_purchase_price, Amount::ZERO);
        assert_eq!(p.total_purchase_price, Amount::ZERO);

        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        assert_eq!(p.average_purchase_price, Amount::from(50));
        assert_eq!(p.total_purchase_price, Amount::from(500));
    }

    #[test]
    fn test_revert_receipt_of_already_issued_goods_is_rejected() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        p.issue(Amount::from(8), Utc::now()).unwrap();

        let err = p
            .revert_receipt(Amount::from(10), Amount::from(500), Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
        assert_eq!(p.quantity, Amount::from(2));
    }

    #[test]
    fn test_revert_issue_leaves_average_untouched() {
        let mut p = product();
        p.receive(Amount::from(10), Amount::from(50), Utc::now());
        p.issue(Amount::from(4), Utc::now()).unwrap();
        p.revert_issue(Amount::from(4), Utc::now());

        assert_eq!(p.quantity, Amount::from(10));
        assert_eq!(p.average_purchase_price, Amount::from(50));
        assert_eq!(p.total_purchase_price, Amount::from(500));
    }

    #[test]
    fn test_low_stock_and_value() {
        let mut p = product();
        p.min_quantity = Amount::from(5);
        assert!(p.is_low_stock());

        p.receive(amt("7.5"), Amount::from(20), Utc::now());
        assert!(!p.is_low_stock());
        assert_eq!(p.stock_value(), Amount::from(150));
    }
}
