use chrono::{DateTime, Utc};

use crate::{
    domain::{ExpenseId, UserId},
    money::Money,
};

/// A stored expense.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub amount: Money,
    pub category: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewExpense {
    pub user_id: UserId,
    pub username: Option<String>,
    pub amount: Money,
    pub category: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// Half-open UTC interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A grouped sum (per user or per category).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Total {
    pub label: String,
    pub amount: Money,
}
