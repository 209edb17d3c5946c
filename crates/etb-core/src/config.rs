use std::{env, fs, path::Path, path::PathBuf};

use crate::{errors::Error, money::Money, scheduler::DailyTime, timezone::Zone, Result};

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub allowed_users: Vec<i64>,
    pub telegram_safe_limit: usize,

    // Daily report
    pub report_chat_id: Option<i64>,
    pub report_time: Option<DailyTime>,

    // Storage
    pub database_path: PathBuf,

    // Budgeting
    pub monthly_budget: Money,
    pub currency: String,
    pub timezone: Zone,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup (the process environment in `load()`).
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_TOKEN")
            .or_else(|| get("TELEGRAM_BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_TOKEN environment variable is required".to_string())
            })?;
        let allowed_users = parse_csv_i64(get("ALLOWED_USER_IDS"))?;
        let telegram_safe_limit = match get("TELEGRAM_SAFE_LIMIT") {
            Some(v) => parse_num::<usize>("TELEGRAM_SAFE_LIMIT", &v)?,
            None => 4000,
        };

        let report_chat_id = get("TELEGRAM_CHAT_ID")
            .or_else(|| get("REMINDER_CHAT_ID"))
            .map(|v| parse_num::<i64>("TELEGRAM_CHAT_ID", &v))
            .transpose()?;

        // A malformed time only disables the report; it must not keep the bot down.
        let report_time = match get("REMINDER_TIME") {
            Some(raw) => match DailyTime::parse(&raw) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::error!("invalid REMINDER_TIME {raw:?} (use HH:MM, 24h): {e}");
                    None
                }
            },
            None => None,
        };

        let database_path = get("DATABASE_URL")
            .map(|url| database_path_from_url(&url))
            .unwrap_or_else(|| PathBuf::from("expenses.db"));

        let monthly_budget = match get("MONTHLY_BUDGET") {
            Some(v) => match v.parse::<Money>() {
                Ok(b) if b.is_positive() => b,
                _ => {
                    return Err(Error::Config(format!(
                        "MONTHLY_BUDGET must be a positive amount, got {v:?}"
                    )))
                }
            },
            None => Money::from_units(300),
        };
        let currency = get("CURRENCY").unwrap_or_else(|| "AED".to_string());
        let timezone = Zone::parse(&get("TIMEZONE").unwrap_or_else(|| "Asia/Dubai".to_string()))?;

        let audit_log_path = PathBuf::from(
            get("AUDIT_LOG_PATH").unwrap_or_else(|| "/tmp/expense-bot-audit.log".to_string()),
        );
        let audit_log_json = get("AUDIT_LOG_JSON")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            allowed_users,
            telegram_safe_limit,
            report_chat_id,
            report_time,
            database_path,
            monthly_budget,
            currency,
            timezone,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn database_path_from_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    let quoted = val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')));
    if quoted {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(key: &str, v: &str) -> Result<T> {
    v.trim()
        .parse::<T>()
        .map_err(|_| Error::Config(format!("{key} must be a number, got {v:?}")))
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| parse_num::<i64>("ALLOWED_USER_IDS", s))
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
