//! Period arithmetic and the month-end forecast.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::{
    domain::UserId,
    ledger::{ExpenseStore, TimeRange, Total},
    money::Money,
    timezone::Zone,
    Result,
};

/// Today's and this month's boundaries in the bot's timezone, as UTC ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Periods {
    pub local_today: NaiveDate,
    pub today: TimeRange,
    pub month: TimeRange,
}

impl Periods {
    pub fn at(now: DateTime<Utc>, tz: Zone) -> Self {
        let local_today = tz.local_date(now);
        let first = first_of_month(local_today);
        let next = first_of_next_month(local_today);

        Self {
            local_today,
            today: TimeRange {
                start: local_midnight_utc(local_today, tz),
                end: local_midnight_utc(local_today + Duration::days(1), tz),
            },
            month: TimeRange {
                start: local_midnight_utc(first, tz),
                end: local_midnight_utc(next, tz),
            },
        }
    }
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    (first_of_next_month(date) - first_of_month(date)).num_days() as u32
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    // No month is longer than 31 days.
    let probe = first_of_month(date) + Duration::days(31);
    first_of_month(probe)
}

fn local_midnight_utc(date: NaiveDate, tz: Zone) -> DateTime<Utc> {
    tz.to_utc(date.and_time(NaiveTime::default()))
}

/// Month-to-date statistics and the linear end-of-month projection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Forecast {
    pub total_month: Money,
    pub total_today: Money,
    pub avg_daily: Money,
    pub predicted: Money,
    pub budget: Money,
    pub remaining: Money,
    pub days_left: u32,
    pub days_in_month: u32,
    pub will_exceed: bool,
}

impl Forecast {
    pub fn compute(total_month: Money, total_today: Money, budget: Money, today: NaiveDate) -> Self {
        let days_passed = today.day().max(1);
        let dim = days_in_month(today);
        let avg_daily = total_month.div_count(days_passed);
        let predicted = avg_daily.mul_count(dim);

        Self {
            total_month,
            total_today,
            avg_daily,
            predicted,
            budget,
            remaining: budget.saturating_sub(total_month),
            days_left: dim.saturating_sub(today.day()),
            days_in_month: dim,
            will_exceed: predicted > budget,
        }
    }
}

/// Everything `/summary` shows.
#[derive(Clone, Debug)]
pub struct Summary {
    pub month_label: String,
    pub forecast: Forecast,
    pub by_user: Vec<Total>,
}

/// Read-side service combining the ledger with the configured timezone and budget.
#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn ExpenseStore>,
    tz: Zone,
    default_budget: Money,
}

impl StatsService {
    pub fn new(store: Arc<dyn ExpenseStore>, tz: Zone, default_budget: Money) -> Self {
        Self {
            store,
            tz,
            default_budget,
        }
    }

    pub fn timezone(&self) -> Zone {
        self.tz
    }

    pub fn periods_at(&self, now: DateTime<Utc>) -> Periods {
        Periods::at(now, self.tz)
    }

    pub async fn budget(&self) -> Result<Money> {
        self.store.budget(self.default_budget).await
    }

    pub async fn today_total(&self, now: DateTime<Utc>, user: Option<UserId>) -> Result<Money> {
        self.store
            .total_between(self.periods_at(now).today, user)
            .await
    }

    pub async fn month_total(&self, now: DateTime<Utc>, user: Option<UserId>) -> Result<Money> {
        self.store
            .total_between(self.periods_at(now).month, user)
            .await
    }

    pub async fn forecast_at(&self, now: DateTime<Utc>) -> Result<Forecast> {
        let periods = self.periods_at(now);
        let total_month = self.store.total_between(periods.month, None).await?;
        let total_today = self.store.total_between(periods.today, None).await?;
        let budget = self.budget().await?;
        Ok(Forecast::compute(
            total_month,
            total_today,
            budget,
            periods.local_today,
        ))
    }

    pub async fn summary_at(&self, now: DateTime<Utc>) -> Result<Summary> {
        let periods = self.periods_at(now);
        let forecast = self.forecast_at(now).await?;
        let by_user = self.store.totals_by_user(periods.month).await?;
        Ok(Summary {
            month_label: periods.local_today.format("%Y-%m").to_string(),
            forecast,
            by_user,
        })
    }

    pub async fn categories_at(&self, now: DateTime<Utc>) -> Result<Vec<Total>> {
        self.store
            .totals_by_category(self.periods_at(now).month)
            .await
    }
}
