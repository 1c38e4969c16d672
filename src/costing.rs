//! Inventory costing engine.
//!
//! Turns one line of an income or expense document into the product update,
//! the movement record and the account-side transaction it implies. The
//! functions here only compute; committing is left to the batch coordinator
//! in `submission`, which is also what the single-line entry points
//! [`LedgerEngine::apply_income`] and [`LedgerEngine::apply_expense`] use.

use crate::account::Account;
use crate::amount::Amount;
use crate::codec;
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, Result};
use crate::ids::{MovementId, ProductId, TransactionId};
use crate::movement::{Direction, Movement};
use crate::product::{Product, StockChange};
use crate::store::Store;
use crate::submission::{Draft, SubmissionReceipt};
use crate::transaction::{Transaction, TxKind};
use chrono::{DateTime, Utc};
use log::debug;

/// Records produced by one document line, linked to each other by id.
#[derive(Debug, Clone)]
pub(crate) struct PlannedLine {
    pub movement: Movement,
    pub transaction: Transaction,
}

/// Document-level facts every line of one document shares.
pub(crate) struct LineContext<'a> {
    /// Supplier (income) or consuming project (expense).
    pub account: &'a Account,
    pub warehouse: &'a str,
    pub warehouse_title: &'a str,
    pub timestamp: DateTime<Utc>,
}

/// Receives `quantity` units of `product` at `unit_price`.
///
/// The supplier pays: the returned transaction is an expense of
/// `quantity × unit_price` on the supplier's account.
pub(crate) fn plan_income_line(
    product: &mut Product,
    quantity: Amount,
    unit_price: Amount,
    ctx: &LineContext<'_>,
) -> Result<PlannedLine> {
    if !quantity.is_positive() {
        return Err(LedgerError::validation(format!(
            "quantity of {} must be greater than zero",
            product.name
        )));
    }
    if unit_price.is_negative() {
        return Err(LedgerError::validation(format!(
            "price of {} must not be negative",
            product.name
        )));
    }

    let line_total = quantity * unit_price;
    let change = product.receive(quantity, unit_price, ctx.timestamp);
    debug!(
        "Receipt of {} x {} at {}: quantity {} -> {}, average {} -> {}",
        quantity,
        product.name,
        unit_price,
        change.previous_quantity,
        change.new_quantity,
        change.previous_average,
        change.new_average
    );

    let description = format!(
        "Warehouse restock: {} - {} {} x {} = {}",
        product.name,
        quantity.trimmed(),
        product.unit,
        codec::format(unit_price),
        codec::format(line_total)
    );

    Ok(records(
        product,
        Direction::In,
        quantity,
        unit_price,
        change,
        format!("Receipt from {}", ctx.account.title),
        Some(ctx.account.title.clone()),
        ctx,
        LegSides {
            from: ctx.account.title.clone(),
            to: ctx.warehouse_title.to_string(),
            description,
            warehouse_operation: false,
        },
    ))
}

/// Issues `quantity` units of `product` to the project in `ctx`.
///
/// The issue is valued at the current average purchase price and booked as
/// an expense on the project's account.
///
/// # Errors
///
/// [`LedgerError::InsufficientStock`] when `quantity` exceeds the quantity on
/// hand.
pub(crate) fn plan_expense_line(
    product: &mut Product,
    quantity: Amount,
    ctx: &LineContext<'_>,
) -> Result<PlannedLine> {
    if !quantity.is_positive() {
        return Err(LedgerError::validation(format!(
            "quantity of {} must be greater than zero",
            product.name
        )));
    }

    let unit_price = product.average_purchase_price;
    let change = product.issue(quantity, ctx.timestamp)?;
    debug!(
        "Issue of {} x {} to {}: quantity {} -> {}",
        quantity, product.name, ctx.account.title, change.previous_quantity, change.new_quantity
    );

    let description = format!(
        "Issued from warehouse: {} ({} {})",
        product.name,
        quantity.trimmed(),
        product.unit
    );

    Ok(records(
        product,
        Direction::Out,
        quantity,
        unit_price,
        change,
        format!("Issued to project: {}", ctx.account.title),
        None,
        ctx,
        LegSides {
            from: ctx.warehouse_title.to_string(),
            to: ctx.account.title.clone(),
            description,
            warehouse_operation: true,
        },
    ))
}

struct LegSides {
    from: String,
    to: String,
    description: String,
    warehouse_operation: bool,
}

/// Builds the movement and its transaction, each carrying the other's id.
#[allow(clippy::too_many_arguments)]
fn records(
    product: &Product,
    direction: Direction,
    quantity: Amount,
    unit_price: Amount,
    change: StockChange,
    movement_description: String,
    supplier: Option<String>,
    ctx: &LineContext<'_>,
    sides: LegSides,
) -> PlannedLine {
    let movement_id = MovementId::new();
    let transaction_id = TransactionId::new();
    let line_total = quantity * unit_price;

    let movement = Movement {
        id: movement_id,
        product_id: product.id,
        direction,
        quantity,
        unit_price,
        line_total,
        timestamp: ctx.timestamp,
        description: movement_description,
        warehouse: ctx.warehouse.to_string(),
        previous_quantity: change.previous_quantity,
        new_quantity: change.new_quantity,
        previous_average_price: change.previous_average,
        new_average_price: change.new_average,
        supplier,
        transaction_id: Some(transaction_id),
    };

    let transaction = Transaction {
        id: transaction_id,
        account_id: ctx.account.id,
        from: sides.from,
        to: sides.to,
        amount: -line_total,
        description: sides.description,
        kind: TxKind::Expense,
        timestamp: ctx.timestamp,
        link: None,
        movement_id: Some(movement_id),
        salary: None,
        warehouse_operation: sides.warehouse_operation,
        attachments: Vec::new(),
    };

    PlannedLine {
        movement,
        transaction,
    }
}

impl<S: Store> LedgerEngine<S> {
    /// Receives one product line from a supplying employee.
    ///
    /// Equivalent to submitting an income document with a single line.
    pub fn apply_income(
        &self,
        product: ProductId,
        quantity: Amount,
        unit_price: Amount,
        supplier: &str,
        warehouse: Option<&str>,
    ) -> Result<SubmissionReceipt> {
        let mut draft = Draft::for_account(supplier);
        if let Some(label) = warehouse {
            draft.set_warehouse(label);
        }
        draft.add_line(product, quantity, unit_price);
        self.submit_income(&mut draft)
    }

    /// Issues one product line to a project.
    ///
    /// Equivalent to submitting an expense document with a single line.
    pub fn apply_expense(
        &self,
        product: ProductId,
        quantity: Amount,
        project: &str,
        warehouse: Option<&str>,
    ) -> Result<SubmissionReceipt> {
        let mut draft = Draft::for_account(project);
        if let Some(label) = warehouse {
            draft.set_warehouse(label);
        }
        draft.add_line(product, quantity, Amount::ZERO);
        self.submit_expense(&mut draft)
    }
}
