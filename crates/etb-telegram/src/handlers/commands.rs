use chrono::{DateTime, Utc};

use etb_core::{
    domain::Sender,
    money::Money,
    parsing::{parse_command, parse_expense, ParsedCommand},
    report,
    utils::AuditEvent,
    Result,
};

use crate::router::AppState;

use super::text;

const RECENT_DEFAULT: usize = 5;
const RECENT_MAX: usize = 20;

pub(crate) async fn handle_command(
    state: &AppState,
    sender: &Sender,
    text: &str,
    now: DateTime<Utc>,
) -> String {
    let cmd = parse_command(text);
    state.audit.record(AuditEvent::command(sender, text));

    match run_command(state, sender, &cmd, text, now).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("/{} failed for {}: {e}", cmd.name, sender.user_id.0);
            state
                .audit
                .record(AuditEvent::error(sender, text, &e.to_string()));
            if cmd.name == "spent" {
                report::SAVE_FAILED.to_string()
            } else {
                report::QUERY_FAILED.to_string()
            }
        }
    }
}

async fn run_command(
    state: &AppState,
    sender: &Sender,
    cmd: &ParsedCommand,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let currency = state.cfg.currency.as_str();
    let stats = &state.stats;
    let user = sender.user_id;

    let reply = match cmd.name.as_str() {
        "start" => report::greeting(),
        "help" => report::help(),
        "spent" => match parse_expense(raw) {
            Some(parsed) => text::record(state, sender, parsed, now).await?,
            None => report::SPENT_USAGE.to_string(),
        },
        "daily" | "today" => report::today_total(stats.today_total(now, Some(user)).await?, currency),
        "monthly" | "total" => report::month_total(stats.month_total(now, None).await?, currency),
        "me" => report::me_total(stats.month_total(now, Some(user)).await?, currency),
        "predict" => report::predict(&stats.forecast_at(now).await?, currency),
        "summary" => report::summary(&stats.summary_at(now).await?, currency),
        "balance" => report::balance(&stats.forecast_at(now).await?, currency),
        "daysleft" => report::days_left(&stats.forecast_at(now).await?),
        "budget" => report::budget(stats.budget().await?, currency),
        "setbudget" => set_budget(state, sender, cmd.args.first()).await?,
        "categories" => {
            let month = stats.periods_at(now).local_today.format("%Y-%m").to_string();
            report::categories(&month, &stats.categories_at(now).await?, currency)
        }
        "recent" => {
            let limit = recent_limit(cmd.args.first().map(String::as_str));
            let rows = state.store.recent(Some(user), limit).await?;
            report::recent(&rows, stats.timezone(), currency)
        }
        "undo" => {
            let month = stats.periods_at(now).month;
            match state.store.delete_last(user, month).await? {
                Some(removed) => {
                    tracing::info!("undo: removed expense {} for {}", removed.id.0, user.0);
                    report::undone(&removed, currency)
                }
                None => report::NOTHING_TO_UNDO.to_string(),
            }
        }
        "whoami" => report::whoami(user.0, sender.chat_id.0),
        _ => report::UNKNOWN_COMMAND.to_string(),
    };

    Ok(reply)
}

async fn set_budget(state: &AppState, sender: &Sender, arg: Option<&String>) -> Result<String> {
    let Some(raw) = arg else {
        return Ok(report::SETBUDGET_USAGE.to_string());
    };
    let budget = match raw.parse::<Money>() {
        Ok(b) if b.is_positive() => b,
        _ => return Ok(report::INVALID_AMOUNT.to_string()),
    };

    state.store.set_budget(budget).await?;
    tracing::info!("budget set to {budget} by {}", sender.user_id.0);
    Ok(report::budget_updated(budget, &state.cfg.currency))
}

fn recent_limit(arg: Option<&str>) -> usize {
    arg.and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(RECENT_DEFAULT)
        .clamp(1, RECENT_MAX)
}
