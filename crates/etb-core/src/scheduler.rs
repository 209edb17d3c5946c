//! Daily budget report.
//!
//! When both a report chat and a `REMINDER_TIME` are configured, one background task
//! sleeps until the next occurrence of that wall-clock time (in the bot's timezone)
//! and posts the daily summary to the chat.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    domain::ChatId,
    errors::Error,
    messaging::port::MessagingPort,
    report,
    stats::StatsService,
    timezone::Zone,
    Result,
};

/// Source of "now" for the report loop.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A wall-clock time of day, `HH:MM` (24h).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyTime(NaiveTime);

impl DailyTime {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid time {raw:?}, expected HH:MM (24h)"));
        let (h, m) = raw.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.trim().parse().map_err(|_| invalid())?;
        let minute: u32 = m.trim().parse().map_err(|_| invalid())?;
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(invalid)
    }

    /// The first occurrence strictly after `now`, in `tz` wall-clock terms.
    pub fn next_after(&self, now: DateTime<Utc>, tz: Zone) -> DateTime<Utc> {
        let local_date = tz.local_date(now);
        let candidate = tz.to_utc(local_date.and_time(self.0));
        if candidate > now {
            candidate
        } else {
            tz.to_utc((local_date + ChronoDuration::days(1)).and_time(self.0))
        }
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

#[derive(Clone)]
pub struct ReportScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    stats: StatsService,
    messenger: Arc<dyn MessagingPort>,
    chat_id: ChatId,
    time: DailyTime,
    currency: String,
    clock: Clock,
    job: Mutex<Option<Job>>,
}

struct Job {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ReportScheduler {
    pub fn new(
        stats: StatsService,
        messenger: Arc<dyn MessagingPort>,
        chat_id: ChatId,
        time: DailyTime,
        currency: impl Into<String>,
    ) -> Self {
        Self::with_clock(stats, messenger, chat_id, time, currency, Arc::new(Utc::now))
    }

    pub fn with_clock(
        stats: StatsService,
        messenger: Arc<dyn MessagingPort>,
        chat_id: ChatId,
        time: DailyTime,
        currency: impl Into<String>,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                stats,
                messenger,
                chat_id,
                time,
                currency: currency.into(),
                clock,
                job: Mutex::new(None),
            }),
        }
    }

    /// `None` (and a log line) when the daily report is not configured.
    pub fn from_config(
        cfg: &Config,
        stats: StatsService,
        messenger: Arc<dyn MessagingPort>,
    ) -> Option<Self> {
        let (Some(chat_id), Some(time)) = (cfg.report_chat_id, cfg.report_time) else {
            tracing::info!("daily report not configured (TELEGRAM_CHAT_ID / REMINDER_TIME); skipping");
            return None;
        };
        Some(Self::new(
            stats,
            messenger,
            ChatId(chat_id),
            time,
            cfg.currency.clone(),
        ))
    }

    #[cfg(test)]
    async fn is_running(&self) -> bool {
        self.inner
            .job
            .lock()
            .await
            .as_ref()
            .is_some_and(|j| !j.handle.is_finished())
    }

    /// Spawn the report task. Calling it again while running is a no-op.
    pub async fn start(&self) {
        let mut job = self.inner.job.lock().await;
        if job.as_ref().is_some_and(|j| !j.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.job_loop(token).await });
        *job = Some(Job { cancel, handle });

        tracing::info!(
            "daily report scheduled at {} ({}) for chat {}",
            self.inner.time,
            self.inner.stats.timezone(),
            self.inner.chat_id.0
        );
    }

    pub async fn stop(&self) {
        if let Some(job) = self.inner.job.lock().await.take() {
            job.cancel.cancel();
            job.handle.abort();
        }
    }

    pub async fn send_report_now(&self) -> Result<()> {
        self.send_report_at((self.inner.clock)()).await
    }

    async fn send_report_at(&self, now: DateTime<Utc>) -> Result<()> {
        let forecast = self.inner.stats.forecast_at(now).await?;
        let html = report::daily_report(&forecast, &self.inner.currency);
        self.inner.messenger.send_html(self.inner.chat_id, &html).await?;
        tracing::info!("daily report sent to {}", self.inner.chat_id.0);
        Ok(())
    }

    async fn job_loop(&self, cancel: CancellationToken) {
        let tz = self.inner.stats.timezone();
        let mut last_fired: Option<DateTime<Utc>> = None;
        loop {
            let now = (self.inner.clock)();
            // Never schedule at or before the slot already served, even if the clock lags.
            let from = last_fired.map_or(now, |fired| fired.max(now));
            let next = self.inner.time.next_after(from, tz);
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {
                    last_fired = Some(next);
                    if let Err(e) = self.send_report_at(next).await {
                        tracing::error!("daily report failed: {e}");
                    }
                }
            }
        }
    }
}
