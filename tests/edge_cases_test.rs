//! Scenario and edge case tests for the ledger and inventory engines.
//!
//! Everything here goes through the public API against a `MemoryStore`.

use std::cell::Cell;
use std::str::FromStr;
use warehouse_ledger::{
    Account, AccountId, AccountKind, Amount, Draft, EngineConfig, LedgerEngine, LedgerError,
    MemoryStore, Movement, MovementId, OrphanPolicy, Product, ProductId, Store, StoreError,
    Transaction, TransactionId, Versioned, WriteBatch,
};

fn amt(s: &str) -> Amount {
    Amount::from_str(s).unwrap()
}

fn engine() -> LedgerEngine<MemoryStore> {
    LedgerEngine::new(MemoryStore::new())
}

fn balance<S: Store>(engine: &LedgerEngine<S>, id: AccountId) -> Amount {
    engine.store().account(id).unwrap().unwrap().doc.balance
}

fn product<S: Store>(engine: &LedgerEngine<S>, id: ProductId) -> Product {
    engine.store().product(id).unwrap().unwrap().doc
}

fn employee<S: Store>(engine: &LedgerEngine<S>, title: &str, opening: i64) -> Account {
    engine
        .register_account(title, AccountKind::Employee, Amount::from(opening))
        .unwrap()
}

fn project<S: Store>(engine: &LedgerEngine<S>, title: &str) -> Account {
    engine
        .register_account(title, AccountKind::Project, Amount::ZERO)
        .unwrap()
}

fn cement<S: Store>(engine: &LedgerEngine<S>) -> ProductId {
    engine
        .register_product(Product::new("Cement", "Building", "bag"))
        .unwrap()
        .id
}

/// Store wrapper that changes an account behind the caller's back right
/// before the next commit, as a second session would.
struct InterferingStore {
    inner: MemoryStore,
    touch: Cell<Option<AccountId>>,
}

impl InterferingStore {
    fn new() -> Self {
        InterferingStore {
            inner: MemoryStore::new(),
            touch: Cell::new(None),
        }
    }
}

impl Store for InterferingStore {
    fn account(&self, id: AccountId) -> Result<Option<Versioned<Account>>, StoreError> {
        self.inner.account(id)
    }

    fn account_by_title(
        &self,
        title: &str,
        kind: AccountKind,
    ) -> Result<Option<Versioned<Account>>, StoreError> {
        self.inner.account_by_title(title, kind)
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.accounts()
    }

    fn product(&self, id: ProductId) -> Result<Option<Versioned<Product>>, StoreError> {
        self.inner.product(id)
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.inner.products()
    }

    fn transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Versioned<Transaction>>, StoreError> {
        self.inner.transaction(id)
    }

    fn transactions_with_link(
        &self,
        link: TransactionId,
    ) -> Result<Vec<Versioned<Transaction>>, StoreError> {
        self.inner.transactions_with_link(link)
    }

    fn transactions_for_movement(
        &self,
        movement: MovementId,
    ) -> Result<Vec<Versioned<Transaction>>, StoreError> {
        self.inner.transactions_for_movement(movement)
    }

    fn transactions_for_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner.transactions_for_account(account)
    }

    fn movement(&self, id: MovementId) -> Result<Option<Versioned<Movement>>, StoreError> {
        self.inner.movement(id)
    }

    fn movements_for_product(&self, product: ProductId) -> Result<Vec<Movement>, StoreError> {
        self.inner.movements_for_product(product)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if let Some(id) = self.touch.take() {
            if let Some(current) = self.inner.account(id)? {
                let mut rewrite = WriteBatch::new();
                rewrite.put_account(current.doc);
                self.inner.commit(rewrite)?;
            }
        }
        self.inner.commit(batch)
    }
}

// ==================== TRANSFER SCENARIOS ====================

#[test]
fn test_transfer_rent_scenario() {
    let engine = engine();
    let a = employee(&engine, "A", 1000);
    let b = project(&engine, "B");

    let receipt = engine
        .transfer(a.id, b.id, Amount::from(300), "rent", Vec::new(), None)
        .unwrap();
    assert_eq!(balance(&engine, a.id), Amount::from(700));
    assert_eq!(balance(&engine, b.id), Amount::from(300));

    let withdrawal = engine
        .store()
        .transaction(receipt.withdrawal)
        .unwrap()
        .unwrap()
        .doc;
    let deposit = engine
        .store()
        .transaction(receipt.deposit)
        .unwrap()
        .unwrap()
        .doc;
    assert_eq!(withdrawal.amount, Amount::from(-300));
    assert_eq!(deposit.amount, Amount::from(300));
    assert_eq!(withdrawal.link, Some(deposit.id));
    assert_eq!(deposit.link, Some(withdrawal.id));

    engine.reverse_transaction(receipt.deposit).unwrap();
    assert_eq!(balance(&engine, a.id), Amount::from(1000));
    assert_eq!(balance(&engine, b.id), Amount::ZERO);
    assert!(engine
        .store()
        .transaction(receipt.withdrawal)
        .unwrap()
        .is_none());
    assert!(engine.store().transaction(receipt.deposit).unwrap().is_none());
}

#[test]
fn test_transfers_conserve_money() {
    let engine = engine();
    let a = employee(&engine, "A", 5000);
    let b = employee(&engine, "B", 0);

    for raw in ["0.0001", "1", "99.99", "1234.5678", "3000"] {
        let before = balance(&engine, a.id) + balance(&engine, b.id);
        engine
            .transfer(a.id, b.id, amt(raw), "move", Vec::new(), None)
            .unwrap();
        let after = balance(&engine, a.id) + balance(&engine, b.id);
        assert_eq!(before, after, "amount {raw}");
    }
    // Overdraft is allowed; balances are plain signed sums.
    engine
        .transfer(a.id, b.id, Amount::from(10_000), "advance", Vec::new(), Some(true))
        .unwrap();
    assert!(balance(&engine, a.id).is_negative());
    engine.verify_balances().unwrap();
}

#[test]
fn test_transfer_rejects_bad_input_without_writing() {
    let engine = engine();
    let a = employee(&engine, "A", 100);
    let b = project(&engine, "B");

    for (amount, description) in [(0, "x"), (-5, "x"), (5, "   ")] {
        let err = engine
            .transfer(a.id, b.id, Amount::from(amount), description, Vec::new(), None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
    assert_eq!(balance(&engine, a.id), Amount::from(100));
    assert_eq!(engine.store().transactions().unwrap().len(), 1);
}

#[test]
fn test_transfer_conflict_commits_nothing() {
    let engine = LedgerEngine::new(InterferingStore::new());
    let a = employee(&engine, "A", 1000);
    let b = project(&engine, "B");

    engine.store().touch.set(Some(a.id));
    let err = engine
        .transfer(a.id, b.id, Amount::from(300), "rent", Vec::new(), None)
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Storage(StoreError::Conflict { .. })
    ));
    assert_eq!(balance(&engine, a.id), Amount::from(1000));
    assert_eq!(balance(&engine, b.id), Amount::ZERO);

    // The caller may simply resubmit.
    engine
        .transfer(a.id, b.id, Amount::from(300), "rent", Vec::new(), None)
        .unwrap();
    assert_eq!(balance(&engine, a.id), Amount::from(700));
}

#[test]
fn test_submission_conflict_keeps_draft_and_balance() {
    let engine = LedgerEngine::new(InterferingStore::new());
    let aidar = employee(&engine, "Aidar", 1000);
    let p = cement(&engine);

    let mut draft = Draft::for_account("Aidar");
    draft.add_line(p, Amount::from(10), Amount::from(50));
    let before = draft.clone();

    engine.store().touch.set(Some(aidar.id));
    let err = engine.submit_income(&mut draft).unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Storage(StoreError::Conflict { .. })
    ));
    assert_eq!(draft, before);
    assert_eq!(balance(&engine, aidar.id), Amount::from(1000));
    assert_eq!(product(&engine, p).quantity, Amount::ZERO);

    engine.submit_income(&mut draft).unwrap();
    assert_eq!(balance(&engine, aidar.id), Amount::from(500));
    assert!(draft.is_empty());
}

#[test]
fn test_reversal_conflict_keeps_both_legs() {
    let engine = LedgerEngine::new(InterferingStore::new());
    let a = employee(&engine, "A", 1000);
    let b = project(&engine, "B");
    let receipt = engine
        .transfer(a.id, b.id, Amount::from(300), "rent", Vec::new(), None)
        .unwrap();

    engine.store().touch.set(Some(b.id));
    let err = engine.reverse_transaction(receipt.withdrawal).unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(engine
        .store()
        .transaction(receipt.withdrawal)
        .unwrap()
        .is_some());
    assert!(engine.store().transaction(receipt.deposit).unwrap().is_some());
    assert_eq!(balance(&engine, b.id), Amount::from(300));
}

// ==================== ORPHANED LEGS ====================

fn orphaned(policy: OrphanPolicy) -> (LedgerEngine<MemoryStore>, AccountId, AccountId, TransactionId) {
    let config = EngineConfig {
        orphan_policy: policy,
        ..EngineConfig::default()
    };
    let engine = LedgerEngine::with_config(MemoryStore::new(), config);
    let a = employee(&engine, "A", 1000);
    let b = project(&engine, "B");
    let receipt = engine
        .transfer(a.id, b.id, Amount::from(300), "rent", Vec::new(), None)
        .unwrap();

    let mut lose = WriteBatch::new();
    lose.delete(warehouse_ledger::DocKey::Transaction(receipt.deposit));
    engine.store().commit(lose).unwrap();
    (engine, a.id, b.id, receipt.withdrawal)
}

#[test]
fn test_orphan_leg_aborts_by_default() {
    let (engine, a, b, withdrawal) = orphaned(OrphanPolicy::Abort);

    let err = engine.reverse_transaction(withdrawal).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    assert!(engine.store().transaction(withdrawal).unwrap().is_some());
    assert_eq!(balance(&engine, a), Amount::from(700));
    assert_eq!(balance(&engine, b), Amount::from(300));
}

#[test]
fn test_orphan_leg_reversed_alone_when_allowed() {
    let (engine, a, b, withdrawal) = orphaned(OrphanPolicy::ReverseFoundLeg);

    let reversal = engine.reverse_transaction(withdrawal).unwrap();
    assert_eq!(reversal.deleted, vec![withdrawal]);
    assert_eq!(balance(&engine, a), Amount::from(1000));
    assert_eq!(balance(&engine, b), Amount::from(300));
}

// ==================== COSTING SCENARIOS ====================

#[test]
fn test_income_reaveraging_scenario() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    let p = cement(&engine);

    engine
        .apply_income(p, Amount::from(10), Amount::from(50), "Aidar", None)
        .unwrap();
    let after_first = product(&engine, p);
    assert_eq!(after_first.quantity, Amount::from(10));
    assert_eq!(after_first.average_purchase_price, Amount::from(50));
    assert_eq!(after_first.total_purchase_price, Amount::from(500));

    engine
        .apply_income(p, Amount::from(10), Amount::from(70), "Aidar", None)
        .unwrap();
    let after_second = product(&engine, p);
    assert_eq!(after_second.quantity, Amount::from(20));
    assert_eq!(after_second.average_purchase_price, Amount::from(60));
    assert_eq!(after_second.total_purchase_price, Amount::from(1200));
}

#[test]
fn test_income_average_formula_holds() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    let p = cement(&engine);

    for (q, price) in [("3", "10"), ("0.5", "17.25"), ("12", "9.99"), ("7", "0")] {
        let before = product(&engine, p);
        engine
            .apply_income(p, amt(q), amt(price), "Aidar", None)
            .unwrap();
        let after = product(&engine, p);

        let expected = (before.total_purchase_price + amt(q) * amt(price))
            .checked_div(before.quantity + amt(q))
            .unwrap();
        assert_eq!(after.average_purchase_price, expected);
        assert_eq!(after.quantity, before.quantity + amt(q));
    }
}

#[test]
fn test_expense_beyond_stock_scenario() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    let site = project(&engine, "Site A");
    let p = cement(&engine);
    engine
        .apply_income(p, Amount::from(5), Amount::from(40), "Aidar", None)
        .unwrap();

    let err = engine
        .apply_expense(p, Amount::from(10), "Site A", None)
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientStock { ref product, .. } if product == "Cement"
    ));
    assert_eq!(product(&engine, p).quantity, Amount::from(5));
    assert_eq!(balance(&engine, site.id), Amount::ZERO);
}

#[test]
fn test_expense_keeps_average_and_drains_exactly() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    project(&engine, "Site A");
    let p = cement(&engine);
    engine
        .apply_income(p, Amount::from(3), Amount::from(10), "Aidar", None)
        .unwrap();
    engine
        .apply_income(p, Amount::from(3), Amount::from(11), "Aidar", None)
        .unwrap();
    let average = product(&engine, p).average_purchase_price;

    engine
        .apply_expense(p, Amount::from(2), "Site A", None)
        .unwrap();
    assert_eq!(product(&engine, p).average_purchase_price, average);
    assert_eq!(product(&engine, p).quantity, Amount::from(4));

    engine
        .apply_expense(p, Amount::from(4), "Site A", None)
        .unwrap();
    let empty = product(&engine, p);
    assert_eq!(empty.quantity, Amount::ZERO);
    assert_eq!(empty.total_purchase_price, Amount::ZERO);
    engine.verify_balances().unwrap();
}

// ==================== MOVEMENT REVERSAL ====================

#[test]
fn test_income_then_reversal_restores_everything() {
    let engine = engine();
    let aidar = employee(&engine, "Aidar", 10_000);
    let p = cement(&engine);
    engine
        .apply_income(p, amt("7"), amt("13.37"), "Aidar", None)
        .unwrap();
    let before = product(&engine, p);
    let before_balance = balance(&engine, aidar.id);

    let receipt = engine
        .apply_income(p, amt("4"), amt("21.5"), "Aidar", None)
        .unwrap();
    engine.reverse_movement(receipt.movements[0]).unwrap();

    let after = product(&engine, p);
    assert_eq!(after.quantity, before.quantity);
    assert_eq!(after.average_purchase_price, before.average_purchase_price);
    assert_eq!(after.total_purchase_price, before.total_purchase_price);
    assert_eq!(balance(&engine, aidar.id), before_balance);
    engine.verify_balances().unwrap();
}

#[test]
fn test_reversing_to_empty_stock_defines_zero_average() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    let p = cement(&engine);
    let receipt = engine
        .apply_income(p, amt("2.5"), amt("80"), "Aidar", None)
        .unwrap();

    let reversal = engine.reverse_movement(receipt.movements[0]).unwrap();
    assert_eq!(reversal.product.quantity, Amount::ZERO);
    assert_eq!(reversal.product.average_purchase_price, Amount::ZERO);
    assert_eq!(reversal.change.new_average, Amount::ZERO);
}

#[test]
fn test_movement_snapshots_survive_later_changes() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    let p = cement(&engine);
    let first = engine
        .apply_income(p, Amount::from(10), Amount::from(50), "Aidar", None)
        .unwrap()
        .movements[0];
    engine
        .apply_income(p, Amount::from(10), Amount::from(70), "Aidar", None)
        .unwrap();

    let m = engine.store().movement(first).unwrap().unwrap().doc;
    assert_eq!(m.previous_quantity, Amount::ZERO);
    assert_eq!(m.new_quantity, Amount::from(10));
    assert_eq!(m.new_average_price, Amount::from(50));
}

// ==================== BATCH SUBMISSION ====================

#[test]
fn test_rejected_batch_changes_nothing_and_keeps_draft() {
    let engine = engine();
    employee(&engine, "Aidar", 0);
    let site = project(&engine, "Site A");
    let p = cement(&engine);
    let sand = engine
        .register_product(Product::new("Sand", "Building", "t"))
        .unwrap()
        .id;
    engine
        .apply_income(p, Amount::from(10), Amount::from(50), "Aidar", None)
        .unwrap();

    let mut draft = Draft::for_account("Site A");
    draft.add_line(p, Amount::from(4), Amount::ZERO);
    draft.add_line(sand, Amount::from(1), Amount::ZERO);
    let before = draft.clone();

    assert!(matches!(
        engine.submit_expense(&mut draft).unwrap_err(),
        LedgerError::InsufficientStock { .. }
    ));
    assert_eq!(draft, before);
    assert_eq!(product(&engine, p).quantity, Amount::from(10));
    assert_eq!(balance(&engine, site.id), Amount::ZERO);
    assert_eq!(engine.store().movement_count().unwrap(), 1);

    // The user fixes the document and submits again.
    draft.remove_line(sand);
    let receipt = engine.submit_expense(&mut draft).unwrap();
    assert_eq!(receipt.total, Amount::from(200));
    assert!(draft.is_empty());
}

#[test]
fn test_same_product_twice_in_one_batch_is_one_line() {
    let engine = engine();
    let aidar = employee(&engine, "Aidar", 0);
    let p = cement(&engine);

    let mut draft = Draft::for_account("Aidar");
    draft.add_line(p, Amount::from(1), Amount::from(1));
    draft.add_line(p, Amount::from(10), Amount::from(50));
    let receipt = engine.submit_income(&mut draft).unwrap();

    assert_eq!(receipt.movements.len(), 1);
    assert_eq!(product(&engine, p).quantity, Amount::from(10));
    assert_eq!(balance(&engine, aidar.id), Amount::from(-500));
}

#[test]
fn test_mixed_history_keeps_ledger_consistent() {
    let engine = engine();
    let aidar = employee(&engine, "Aidar", 20_000);
    let site = project(&engine, "Site A");
    let p = cement(&engine);

    engine
        .apply_income(p, Amount::from(10), Amount::from(50), "Aidar", None)
        .unwrap();
    let issue = engine
        .apply_expense(p, Amount::from(3), "Site A", None)
        .unwrap();
    let t = engine
        .transfer(aidar.id, site.id, Amount::from(1000), "advance", Vec::new(), None)
        .unwrap();
    engine.reverse_movement(issue.movements[0]).unwrap();
    engine.reverse_transaction(t.withdrawal).unwrap();

    engine.verify_balances().unwrap();
    assert_eq!(balance(&engine, aidar.id), Amount::from(19_500));
    assert_eq!(balance(&engine, site.id), Amount::ZERO);
    assert_eq!(product(&engine, p).quantity, Amount::from(10));
}
