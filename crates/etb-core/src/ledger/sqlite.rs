use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    domain::{ExpenseId, UserId},
    errors::Error,
    ledger::{
        port::{ExpenseStore, BUDGET_KEY},
        types::{Expense, NewExpense, TimeRange, Total},
    },
    money::Money,
    Result,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS expenses (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER NOT NULL,
  username TEXT,
  amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
  category TEXT NOT NULL DEFAULT '',
  note TEXT NOT NULL DEFAULT '',
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_expenses_created_at ON expenses(created_at);
CREATE INDEX IF NOT EXISTS idx_expenses_user_created ON expenses(user_id, created_at);
CREATE TABLE IF NOT EXISTS settings (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#;

const EXPENSE_COLUMNS: &str = "id, user_id, username, amount_cents, category, note, created_at";

/// SQLite-backed ledger.
///
/// A single connection guarded by a mutex; every statement runs on tokio's
/// blocking pool so the dispatcher threads never wait on disk I/O.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::info!(
            "ledger opened at {} (journal_mode={mode})",
            path.as_ref().display()
        );
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| Error::External("ledger connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::External(format!("ledger task failed: {e}")))?
    }
}

#[async_trait]
impl ExpenseStore for SqliteLedger {
    async fn init(&self, default_budget: Money) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute_batch(SCHEMA)?;
            conn.execute(
                "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
                params![BUDGET_KEY, default_budget.to_string()],
            )?;
            Ok(())
        })
        .await?;
        tracing::info!("ledger schema ready");
        Ok(())
    }

    async fn add_expense(&self, new: NewExpense) -> Result<Expense> {
        if !new.amount.is_positive() {
            return Err(Error::Parse(format!(
                "expense amount must be positive, got {}",
                new.amount
            )));
        }
        let cents = new.amount.cents()?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO expenses (user_id, username, amount_cents, category, note, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.user_id.0,
                    new.username,
                    cents,
                    new.category,
                    new.note,
                    new.created_at.timestamp()
                ],
            )?;
            Ok(Expense {
                id: ExpenseId(conn.last_insert_rowid()),
                user_id: new.user_id,
                username: new.username,
                amount: Money::from_cents(cents),
                category: new.category,
                note: new.note,
                created_at: from_unix(new.created_at.timestamp()),
            })
        })
        .await
    }

    async fn total_between(&self, range: TimeRange, user: Option<UserId>) -> Result<Money> {
        self.with_conn(move |conn| {
            let cents: i64 = conn.query_row(
                "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses \
                 WHERE created_at >= ?1 AND created_at < ?2 AND (?3 IS NULL OR user_id = ?3)",
                params![
                    range.start.timestamp(),
                    range.end.timestamp(),
                    user.map(|u| u.0)
                ],
                |row| row.get(0),
            )?;
            Ok(Money::from_cents(cents))
        })
        .await
    }

    async fn totals_by_user(&self, range: TimeRange) -> Result<Vec<Total>> {
        self.grouped_totals(
            "COALESCE(NULLIF(username, ''), CAST(user_id AS TEXT))",
            range,
        )
        .await
    }

    async fn totals_by_category(&self, range: TimeRange) -> Result<Vec<Total>> {
        self.grouped_totals("COALESCE(NULLIF(category, ''), 'uncategorized')", range)
            .await
    }

    async fn recent(&self, user: Option<UserId>, limit: usize) -> Result<Vec<Expense>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {EXPENSE_COLUMNS} FROM expenses \
                 WHERE (?1 IS NULL OR user_id = ?1) \
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user.map(|u| u.0), limit], row_to_expense)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn delete_last(&self, user: UserId, range: TimeRange) -> Result<Option<Expense>> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let sql = format!(
                "SELECT {EXPENSE_COLUMNS} FROM expenses \
                 WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3 \
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            );
            let last = tx
                .query_row(
                    &sql,
                    params![user.0, range.start.timestamp(), range.end.timestamp()],
                    row_to_expense,
                )
                .optional()?;

            if let Some(expense) = &last {
                tx.execute("DELETE FROM expenses WHERE id = ?1", params![expense.id.0])?;
            }
            tx.commit()?;
            Ok(last)
        })
        .await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }
}

impl SqliteLedger {
    async fn grouped_totals(&self, label_expr: &'static str, range: TimeRange) -> Result<Vec<Total>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {label_expr} AS label, SUM(amount_cents) AS total FROM expenses \
                 WHERE created_at >= ?1 AND created_at < ?2 \
                 GROUP BY label ORDER BY total DESC, label ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![range.start.timestamp(), range.end.timestamp()],
                    |row| {
                        Ok(Total {
                            label: row.get(0)?,
                            amount: Money::from_cents(row.get(1)?),
                        })
                    },
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

fn row_to_expense(row: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: ExpenseId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        username: row.get(2)?,
        amount: Money::from_cents(row.get(3)?),
        category: row.get(4)?,
        note: row.get(5)?,
        created_at: from_unix(row.get(6)?),
    })
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn march() -> TimeRange {
        TimeRange {
            start: at(2026, 3, 1, 0),
            end: at(2026, 4, 1, 0),
        }
    }

    fn new_expense(user: i64, name: Option<&str>, amount: &str, category: &str, when: DateTime<Utc>) -> NewExpense {
        NewExpense {
            user_id: UserId(user),
            username: name.map(|s| s.to_string()),
            amount: amount.parse().unwrap(),
            category: category.to_string(),
            note: String::new(),
            created_at: when,
        }
    }

    async fn ledger() -> SqliteLedger {
        let l = SqliteLedger::open_in_memory().unwrap();
        l.init(Money::from_units(300)).await.unwrap();
        l
    }

    #[tokio::test]
    async fn totals_respect_range_and_user() {
        let l = ledger().await;
        l.add_expense(new_expense(1, Some("Ann"), "10.50", "food", at(2026, 3, 2, 9)))
            .await
            .unwrap();
        l.add_expense(new_expense(2, Some("Bob"), "4.25", "taxi", at(2026, 3, 2, 10)))
            .await
            .unwrap();
        // Outside the range: the end bound is exclusive.
        l.add_expense(new_expense(1, Some("Ann"), "100", "rent", at(2026, 4, 1, 0)))
            .await
            .unwrap();

        assert_eq!(l.total_between(march(), None).await.unwrap(), "14.75".parse().unwrap());
        assert_eq!(
            l.total_between(march(), Some(UserId(1))).await.unwrap(),
            "10.50".parse().unwrap()
        );
        assert_eq!(
            l.total_between(march(), Some(UserId(3))).await.unwrap(),
            Money::ZERO
        );
    }

    #[tokio::test]
    async fn groups_by_user_and_category() {
        let l = ledger().await;
        l.add_expense(new_expense(1, Some("Ann"), "5", "food", at(2026, 3, 3, 8)))
            .await
            .unwrap();
        l.add_expense(new_expense(1, Some("Ann"), "7", "", at(2026, 3, 4, 8)))
            .await
            .unwrap();
        l.add_expense(new_expense(42, None, "20", "food", at(2026, 3, 5, 8)))
            .await
            .unwrap();

        let by_user = l.totals_by_user(march()).await.unwrap();
        assert_eq!(by_user.len(), 2);
        assert_eq!(by_user[0].label, "42");
        assert_eq!(by_user[0].amount, Money::from_units(20));
        assert_eq!(by_user[1].label, "Ann");
        assert_eq!(by_user[1].amount, Money::from_units(12));

        let by_cat = l.totals_by_category(march()).await.unwrap();
        assert_eq!(by_cat[0].label, "food");
        assert_eq!(by_cat[0].amount, Money::from_units(25));
        assert_eq!(by_cat[1].label, "uncategorized");
    }

    #[tokio::test]
    async fn delete_last_only_touches_callers_newest_in_range() {
        let l = ledger().await;
        let first = l
            .add_expense(new_expense(1, None, "1", "a", at(2026, 3, 1, 1)))
            .await
            .unwrap();
        l.add_expense(new_expense(1, None, "2", "b", at(2026, 3, 1, 2)))
            .await
            .unwrap();
        l.add_expense(new_expense(2, None, "3", "c", at(2026, 3, 1, 3)))
            .await
            .unwrap();

        let removed = l.delete_last(UserId(1), march()).await.unwrap().unwrap();
        assert_eq!(removed.category, "b");

        let remaining = l.recent(Some(UserId(1)), 10).await.unwrap();
        assert_eq!(remaining, vec![first]);

        let empty_range = TimeRange {
            start: at(2026, 5, 1, 0),
            end: at(2026, 5, 1, 0) + Duration::days(31),
        };
        assert!(l.delete_last(UserId(1), empty_range).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let l = ledger().await;
        for h in 1..=4 {
            l.add_expense(new_expense(1, None, "1", &format!("c{h}"), at(2026, 3, 1, h)))
                .await
                .unwrap();
        }
        let rows = l.recent(None, 2).await.unwrap();
        let cats: Vec<_> = rows.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(cats, vec!["c4", "c3"]);
    }

    #[tokio::test]
    async fn budget_seeded_once_and_updatable() {
        let l = ledger().await;
        assert_eq!(
            l.budget(Money::from_units(1)).await.unwrap(),
            Money::from_units(300)
        );

        l.set_budget(Money::from_units(450)).await.unwrap();
        // Re-running init must not reset a budget the user changed.
        l.init(Money::from_units(300)).await.unwrap();
        assert_eq!(
            l.budget(Money::from_units(1)).await.unwrap(),
            Money::from_units(450)
        );

        l.set_setting(BUDGET_KEY, "lots").await.unwrap();
        assert_eq!(
            l.budget(Money::from_units(99)).await.unwrap(),
            Money::from_units(99)
        );
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let l = ledger().await;
        let err = l
            .add_expense(new_expense(1, None, "0", "x", at(2026, 3, 1, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
