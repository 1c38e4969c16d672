//! Batch coordinator for multi-line income and expense documents.
//!
//! A [`Draft`] is the in-progress document a user edits between screens. On
//! submission the coordinator checks the document-level preconditions before
//! touching the store, re-reads every product it needs, plans each line with
//! the costing engine and commits every product update, movement,
//! transaction and the account balance change as one batch. The batch
//! requires the account to be unchanged since it was read. The draft is
//! cleared only after that commit succeeded; on failure it is left exactly as
//! the user entered it.

use crate::account::AccountKind;
use crate::amount::Amount;
use crate::costing::{plan_expense_line, plan_income_line, LineContext, PlannedLine};
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, Result};
use crate::ids::{AccountId, MovementId, ProductId, TransactionId};
use crate::product::Product;
use crate::store::{DocKey, Store, Versioned, WriteBatch};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

/// One product line of a draft document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: ProductId,
    pub quantity: Amount,
    /// Purchase price per unit; ignored by expense documents, which are
    /// valued at the product's average price.
    pub unit_price: Amount,
}

/// An income or expense document being assembled.
///
/// For income documents `account` is the supplying employee's title, for
/// expense documents the consuming project's title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub account: Option<String>,
    pub warehouse: Option<String>,
    lines: Vec<DraftLine>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft with `title` already selected.
    pub fn for_account(title: &str) -> Self {
        Draft {
            account: Some(title.to_string()),
            ..Self::default()
        }
    }

    pub fn select_account(&mut self, title: &str) {
        self.account = Some(title.to_string());
    }

    pub fn set_warehouse(&mut self, label: &str) {
        self.warehouse = Some(label.to_string());
    }

    /// Adds a line, replacing the existing line for the same product.
    pub fn add_line(&mut self, product_id: ProductId, quantity: Amount, unit_price: Amount) {
        let line = DraftLine {
            product_id,
            quantity,
            unit_price,
        };
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
    }

    /// Removes the line for `product_id`; returns whether there was one.
    pub fn remove_line(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of line quantities.
    pub fn total_quantity(&self) -> Amount {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of `quantity × unit_price` over all lines.
    pub fn total_value(&self) -> Amount {
        self.lines.iter().map(|l| l.quantity * l.unit_price).sum()
    }

    /// Forgets the selection and every line.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Checks the document-level preconditions and returns the selected title.
    fn validate(&self) -> Result<String> {
        let title = self
            .account
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LedgerError::validation("select an account for the document"))?;
        if self.lines.is_empty() {
            return Err(LedgerError::validation("add at least one line item"));
        }
        if let Some(line) = self.lines.iter().find(|l| !l.quantity.is_positive()) {
            return Err(LedgerError::validation(format!(
                "quantity for product {} must be greater than zero",
                line.product_id
            )));
        }
        Ok(title.to_string())
    }
}

/// What a committed document wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Account whose balance the document changed.
    pub account_id: AccountId,
    pub movements: Vec<MovementId>,
    pub transactions: Vec<TransactionId>,
    /// Money value of the whole document.
    pub total: Amount,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy)]
enum DocumentKind {
    Income,
    Expense,
}

/// Line record as read from CSV: `product,quantity[,price]`.
#[derive(Debug, Deserialize)]
struct LineRecord {
    /// Product name or id.
    product: String,
    quantity: String,
    price: Option<String>,
}

impl<S: Store> LedgerEngine<S> {
    /// Commits an income document: goods received from a supplying employee.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] when no supplier is selected or there
    ///   are no lines (checked before any storage access)
    /// - [`LedgerError::NotFound`] for an unknown supplier or product
    /// - [`LedgerError::Storage`] if the commit fails, including when the
    ///   supplier's balance changed after it was read
    pub fn submit_income(&self, draft: &mut Draft) -> Result<SubmissionReceipt> {
        self.submit(draft, DocumentKind::Income)
    }

    /// Commits an expense document: goods issued to a project.
    ///
    /// Any line asking for more than is on hand rejects the whole document
    /// with [`LedgerError::InsufficientStock`]; no stock changes.
    pub fn submit_expense(&self, draft: &mut Draft) -> Result<SubmissionReceipt> {
        self.submit(draft, DocumentKind::Expense)
    }

    fn submit(&self, draft: &mut Draft, kind: DocumentKind) -> Result<SubmissionReceipt> {
        let title = draft.validate()?;

        let account_kind = match kind {
            DocumentKind::Income => AccountKind::Employee,
            DocumentKind::Expense => AccountKind::Project,
        };
        let Versioned {
            version: account_version,
            doc: mut account,
        } = self.require_account_by_title(&title, account_kind)?;

        let warehouse = draft
            .warehouse
            .clone()
            .unwrap_or_else(|| self.config.warehouse_label.clone());
        let timestamp = Utc::now();

        // Products as the batch will leave them; a product listed twice sees
        // its first line's effect.
        let mut staged: BTreeMap<ProductId, Product> = BTreeMap::new();
        let mut planned: Vec<PlannedLine> = Vec::with_capacity(draft.lines().len());
        {
            let ctx = LineContext {
                account: &account,
                warehouse: &warehouse,
                warehouse_title: &self.config.warehouse_title,
                timestamp,
            };
            for line in draft.lines() {
                let product = self.stage_product(&mut staged, line.product_id)?;
                let records = match kind {
                    DocumentKind::Income => {
                        plan_income_line(product, line.quantity, line.unit_price, &ctx)?
                    }
                    DocumentKind::Expense => plan_expense_line(product, line.quantity, &ctx)?,
                };
                planned.push(records);
            }
        }

        let total: Amount = planned.iter().map(|p| p.movement.line_total).sum();
        account.apply_delta(-total, timestamp);

        let receipt = SubmissionReceipt {
            account_id: account.id,
            movements: planned.iter().map(|p| p.movement.id).collect(),
            transactions: planned.iter().map(|p| p.transaction.id).collect(),
            total,
            timestamp,
        };

        let mut batch = WriteBatch::new();
        for product in staged.into_values() {
            batch.put_product(product);
        }
        for line in planned {
            batch.put_movement(line.movement).put_transaction(line.transaction);
        }
        batch
            .expect(DocKey::Account(account.id), account_version)
            .put_account(account);
        self.store.commit(batch)?;

        draft.clear();
        info!(
            "Committed {} document for {:?}: {} line(s), total {}",
            match kind {
                DocumentKind::Income => "income",
                DocumentKind::Expense => "expense",
            },
            title,
            receipt.movements.len(),
            total
        );
        Ok(receipt)
    }

    /// Returns the staged copy of a product, reading the stored record the
    /// first time the batch needs it.
    fn stage_product<'a>(
        &self,
        staged: &'a mut BTreeMap<ProductId, Product>,
        id: ProductId,
    ) -> Result<&'a mut Product> {
        match staged.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let fresh = self.require_product(id)?.doc;
                Ok(entry.insert(fresh))
            }
        }
    }

    /// Builds a draft for `account` from CSV lines `product,quantity[,price]`.
    ///
    /// Products may be given by name or id. Unlike the ledger operations
    /// themselves this reads the catalog once up front; the submission
    /// re-reads each product before computing anything.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] naming the row of the first line that
    /// cannot be understood; [`LedgerError::NotFound`] for unknown products.
    pub fn draft_from_csv<R: Read>(&self, account: &str, reader: R) -> Result<Draft> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let catalog = self.store.products()?;
        let mut draft = Draft::for_account(account);

        for (row_idx, result) in csv_reader.deserialize::<LineRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row
            let record = result?;

            let product = catalog
                .iter()
                .find(|p| p.name == record.product || p.id.to_string() == record.product)
                .ok_or_else(|| LedgerError::not_found("Product", &record.product))?;

            let quantity = Amount::from_str(&record.quantity).map_err(|_| {
                LedgerError::validation(format!(
                    "row {row_num}: invalid quantity {:?}",
                    record.quantity
                ))
            })?;

            let unit_price = match record.price.as_deref().map(str::trim) {
                None | Some("") => Amount::ZERO,
                Some(raw) => crate::codec::parse(raw).map_err(|_| {
                    LedgerError::validation(format!("row {row_num}: invalid price {raw:?}"))
                })?,
            };

            draft.add_line(product.id, quantity, unit_price);
        }

        Ok(draft)
    }
}
