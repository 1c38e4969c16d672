//! Warehouse Ledger CLI
//!
//! Runs ledger and inventory operations against a JSON snapshot of the store
//! and prints reports as CSV.
//!
//! # Usage
//!
//! ```bash
//! warehouse-ledger account add Aidar --kind employee --opening "20 000"
//! warehouse-ledger product add Cement --category Building --unit bag
//! warehouse-ledger income --supplier Aidar lines.csv
//! warehouse-ledger transfer Aidar "Site A" 300 --description rent
//! warehouse-ledger balances > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `LEDGER_STORE`: snapshot file (default `ledger.json`)
//! - `LEDGER_WAREHOUSE`: warehouse label recorded on movements
//! - `LEDGER_ALLOW_ORPHANS`: reverse a transfer leg even if its sibling is gone
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;
use warehouse_ledger::{
    codec, Account, AccountKind, Amount, EngineConfig, LedgerEngine, LedgerError, MemoryStore,
    OrphanPolicy, Product, Result, Store, StoreError,
};

#[derive(Parser, Debug)]
#[command(name = "warehouse-ledger", version, about = "Ledger and warehouse bookkeeping")]
struct Cli {
    /// JSON snapshot the store is loaded from and saved to
    #[arg(long, env = "LEDGER_STORE", default_value = "ledger.json", global = true)]
    store: PathBuf,

    /// Warehouse label recorded on new movements
    #[arg(long, env = "LEDGER_WAREHOUSE", global = true)]
    warehouse: Option<String>,

    /// Reverse a transfer leg even when its sibling no longer exists
    #[arg(long, env = "LEDGER_ALLOW_ORPHANS", global = true)]
    allow_orphans: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCommand),
    /// Manage the product catalog
    #[command(subcommand)]
    Product(ProductCommand),
    /// Move money between two accounts
    Transfer {
        /// Source account title or id
        from: String,
        /// Target account title or id
        to: String,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        #[arg(short, long)]
        description: String,
        /// Mark both legs as salary payments
        #[arg(long)]
        salary: bool,
    },
    /// Delete a transaction and its transfer sibling, restoring balances
    ReverseTransaction { id: String },
    /// Receive goods from a supplier; lines are CSV `product,quantity,price`
    Income {
        /// Supplying employee account
        #[arg(long)]
        supplier: String,
        lines: PathBuf,
    },
    /// Issue goods to a project; lines are CSV `product,quantity`
    Expense {
        /// Consuming project account
        #[arg(long)]
        project: String,
        lines: PathBuf,
    },
    /// Undo one inventory movement
    ReverseMovement { id: String },
    /// Account balances as CSV
    Balances,
    /// Stock list as CSV
    Stock,
    /// Movement history of a product as CSV
    History { product: String },
    /// Transactions of an account as CSV
    Statement { account: String },
    /// Warehouse statistics as JSON
    Stats,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Register a new account
    Add {
        title: String,
        #[arg(long, default_value = "employee")]
        kind: AccountKind,
        #[arg(long, value_parser = parse_amount, default_value = "0")]
        opening: Amount,
    },
}

#[derive(Subcommand, Debug)]
enum ProductCommand {
    /// Register a new product with empty stock
    Add {
        name: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long, default_value = "pcs")]
        unit: String,
        #[arg(long, value_parser = parse_amount, default_value = "0")]
        min_quantity: Amount,
    },
}

fn parse_amount(raw: &str) -> std::result::Result<Amount, String> {
    codec::parse(raw).map_err(|e| e.to_string())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = EngineConfig::default();
    if let Some(label) = &cli.warehouse {
        config.warehouse_label = label.clone();
    }
    if cli.allow_orphans {
        config.orphan_policy = OrphanPolicy::ReverseFoundLeg;
    }

    let engine = LedgerEngine::with_config(MemoryStore::open(&cli.store)?, config);
    let mutated = match cli.command {
        Command::Account(AccountCommand::Add {
            title,
            kind,
            opening,
        }) => {
            let account = engine.register_account(&title, kind, opening)?;
            println!("{}", account.id);
            true
        }
        Command::Product(ProductCommand::Add {
            name,
            category,
            unit,
            min_quantity,
        }) => {
            let mut product = Product::new(name, category, unit);
            product.min_quantity = min_quantity;
            let product = engine.register_product(product)?;
            println!("{}", product.id);
            true
        }
        Command::Transfer {
            from,
            to,
            amount,
            description,
            salary,
        } => {
            let source = resolve_account(&engine, &from)?;
            let target = resolve_account(&engine, &to)?;
            let receipt = engine.transfer(
                source.id,
                target.id,
                amount,
                &description,
                Vec::new(),
                salary.then_some(true),
            )?;
            println!("{},{}", receipt.withdrawal, receipt.deposit);
            true
        }
        Command::ReverseTransaction { id } => {
            let reversal = engine.reverse_transaction(parse_id(&id)?)?;
            for id in reversal.deleted {
                println!("{}", id);
            }
            true
        }
        Command::Income { supplier, lines } => {
            let mut draft = engine.draft_from_csv(&supplier, BufReader::new(File::open(lines)?))?;
            let receipt = engine.submit_income(&mut draft)?;
            println!("{}", codec::format(receipt.total));
            true
        }
        Command::Expense { project, lines } => {
            let mut draft = engine.draft_from_csv(&project, BufReader::new(File::open(lines)?))?;
            let receipt = engine.submit_expense(&mut draft)?;
            println!("{}", codec::format(receipt.total));
            true
        }
        Command::ReverseMovement { id } => {
            let reversal = engine.reverse_movement(parse_id(&id)?)?;
            println!(
                "{},{},{}",
                reversal.product.name,
                reversal.product.quantity,
                reversal.product.average_purchase_price
            );
            true
        }
        Command::Balances => {
            engine.write_balances(io::stdout().lock())?;
            false
        }
        Command::Stock => {
            engine.write_stock(io::stdout().lock())?;
            false
        }
        Command::History { product } => {
            let product = resolve_product(&engine, &product)?;
            engine.write_history(product.id, io::stdout().lock())?;
            false
        }
        Command::Statement { account } => {
            let account = resolve_account(&engine, &account)?;
            engine.write_statement(account.id, io::stdout().lock())?;
            false
        }
        Command::Stats => {
            let stats = engine.stats()?;
            let json = serde_json::to_string_pretty(&stats).map_err(StoreError::from)?;
            println!("{}", json);
            false
        }
    };

    if mutated {
        engine.store().save(&cli.store)?;
    }
    Ok(())
}

fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| LedgerError::Validation(format!("{raw:?} is not a valid id")))
}

/// Finds an account by title, falling back to its id.
fn resolve_account<S: Store>(engine: &LedgerEngine<S>, key: &str) -> Result<Account> {
    if let Some(account) = engine.find_account(key)? {
        return Ok(account);
    }
    let by_id = match key.parse() {
        Ok(id) => engine.store().account(id)?.map(|v| v.doc),
        Err(_) => None,
    };
    by_id.ok_or_else(|| LedgerError::NotFound {
        entity: "Account",
        key: key.to_string(),
    })
}

/// Finds a product by name, falling back to its id.
fn resolve_product<S: Store>(engine: &LedgerEngine<S>, key: &str) -> Result<Product> {
    if let Some(product) = engine.find_product(key)? {
        return Ok(product);
    }
    let by_id = match key.parse() {
        Ok(id) => engine.store().product(id)?.map(|v| v.doc),
        Err(_) => None,
    };
    by_id.ok_or_else(|| LedgerError::NotFound {
        entity: "Product",
        key: key.to_string(),
    })
}
