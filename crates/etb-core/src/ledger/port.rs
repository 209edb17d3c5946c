use async_trait::async_trait;

use crate::{
    domain::UserId,
    ledger::types::{Expense, NewExpense, TimeRange, Total},
    money::Money,
    Result,
};

pub const BUDGET_KEY: &str = "budget";

/// Storage port for expenses and bot settings.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Create tables if missing and seed the budget setting when absent.
    async fn init(&self, default_budget: Money) -> Result<()>;

    async fn add_expense(&self, new: NewExpense) -> Result<Expense>;

    /// Sum of expenses in `range`, optionally for one user. Zero when empty.
    async fn total_between(&self, range: TimeRange, user: Option<UserId>) -> Result<Money>;

    /// Per-user sums in `range`, largest first.
    async fn totals_by_user(&self, range: TimeRange) -> Result<Vec<Total>>;

    /// Per-category sums in `range`, largest first.
    async fn totals_by_category(&self, range: TimeRange) -> Result<Vec<Total>>;

    /// Newest first.
    async fn recent(&self, user: Option<UserId>, limit: usize) -> Result<Vec<Expense>>;

    /// Remove the newest expense of `user` inside `range`.
    async fn delete_last(&self, user: UserId, range: TimeRange) -> Result<Option<Expense>>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Current monthly budget, falling back to `default` when unset or unparseable.
    async fn budget(&self, default: Money) -> Result<Money> {
        let Some(raw) = self.get_setting(BUDGET_KEY).await? else {
            return Ok(default);
        };
        match raw.parse::<Money>() {
            Ok(b) => Ok(b),
            Err(e) => {
                tracing::warn!("stored budget {raw:?} is invalid ({e}); using default");
                Ok(default)
            }
        }
    }

    async fn set_budget(&self, budget: Money) -> Result<()> {
        self.set_setting(BUDGET_KEY, &budget.to_string()).await
    }
}
