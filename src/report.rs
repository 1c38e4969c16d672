//! Read-only reports over the ledger and the warehouse.
//!
//! CSV reports are written with rows in a deterministic order so their output
//! can be diffed. Money columns in the balance and statement reports use the
//! display codec; quantities and prices are written at full precision.

use crate::amount::Amount;
use crate::codec;
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, Result};
use crate::ids::{AccountId, ProductId};
use crate::store::Store;
use serde::Serialize;
use std::io::Write;

/// Warehouse dashboard figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseStats {
    pub total_products: usize,
    /// Σ `quantity × average_purchase_price` over all products.
    pub total_value: Amount,
    pub low_stock_count: usize,
    pub accounts: usize,
}

impl<S: Store> LedgerEngine<S> {
    /// Writes every account with its balance, ordered by title.
    pub fn write_balances<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "title", "kind", "balance", "display", "visible"])?;

        for account in self.store.accounts()? {
            csv_writer.write_record([
                account.id.to_string(),
                account.title.clone(),
                account.kind.to_string(),
                account.balance.to_string(),
                account.display_balance(),
                account.visible.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the stock list, ordered by product name, with a low-stock flag.
    pub fn write_stock<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "category",
            "quantity",
            "unit",
            "average_price",
            "total_price",
            "low_stock",
        ])?;

        for product in self.store.products()? {
            csv_writer.write_record([
                product.id.to_string(),
                product.name.clone(),
                product.category.clone(),
                product.quantity.to_string(),
                product.unit.clone(),
                product.average_purchase_price.to_string(),
                product.total_purchase_price.to_string(),
                product.is_low_stock().to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the movement history of one product, newest first.
    pub fn write_history<W: Write>(&self, product: ProductId, writer: W) -> Result<()> {
        let product = self.require_product(product)?.doc;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "timestamp",
            "movement",
            "direction",
            "quantity",
            "unit_price",
            "line_total",
            "previous_quantity",
            "new_quantity",
            "previous_average",
            "new_average",
            "warehouse",
            "description",
        ])?;

        for m in self.store.movements_for_product(product.id)? {
            csv_writer.write_record([
                m.timestamp.to_rfc3339(),
                m.id.to_string(),
                m.direction.to_string(),
                m.quantity.to_string(),
                m.unit_price.to_string(),
                m.line_total.to_string(),
                m.previous_quantity.to_string(),
                m.new_quantity.to_string(),
                m.previous_average_price.to_string(),
                m.new_average_price.to_string(),
                m.warehouse.clone(),
                m.description.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the transactions of one account, newest first.
    pub fn write_statement<W: Write>(&self, account: AccountId, writer: W) -> Result<()> {
        let account = self.require_account(account)?.doc;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "timestamp",
            "transaction",
            "kind",
            "from",
            "to",
            "amount",
            "display",
            "description",
        ])?;

        for t in self.store.transactions_for_account(account.id)? {
            csv_writer.write_record([
                t.timestamp.to_rfc3339(),
                t.id.to_string(),
                t.kind.to_string(),
                t.from.clone(),
                t.to.clone(),
                t.amount.to_string(),
                codec::format_signed(t.amount),
                t.description.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Computes the warehouse dashboard figures.
    pub fn stats(&self) -> Result<WarehouseStats> {
        let products = self.store.products()?;
        Ok(WarehouseStats {
            total_products: products.len(),
            total_value: products.iter().map(|p| p.stock_value()).sum(),
            low_stock_count: products.iter().filter(|p| p.is_low_stock()).count(),
            accounts: self.store.accounts()?.len(),
        })
    }

    /// Checks that every account balance equals the sum of its transactions.
    ///
    /// Returns the accounts that disagree with the balance their
    /// transactions add up to.
    pub fn audit_balances(&self) -> Result<Vec<(AccountId, Amount, Amount)>> {
        let mut mismatched = Vec::new();
        for account in self.store.accounts()? {
            let booked: Amount = self
                .store
                .transactions_for_account(account.id)?
                .iter()
                .map(|t| t.amount)
                .sum();
            if booked != account.balance {
                mismatched.push((account.id, account.balance, booked));
            }
        }
        Ok(mismatched)
    }

    /// Like [`LedgerEngine::audit_balances`] but fails on the first mismatch.
    pub fn verify_balances(&self) -> Result<()> {
        match self.audit_balances()?.first() {
            None => Ok(()),
            Some((id, balance, booked)) => Err(LedgerError::validation(format!(
                "account {id} has balance {balance} but its transactions sum to {booked}"
            ))),
        }
    }
}
