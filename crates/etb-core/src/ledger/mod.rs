//! Expense ledger: the storage port and its SQLite implementation.

pub mod port;
pub mod sqlite;
pub mod types;

pub use port::ExpenseStore;
pub use sqlite::SqliteLedger;
pub use types::{Expense, NewExpense, TimeRange, Total};
