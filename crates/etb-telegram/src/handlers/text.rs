use chrono::{DateTime, Utc};

use etb_core::{
    domain::Sender,
    ledger::NewExpense,
    parsing::{parse_expense, ParsedExpense},
    report,
    utils::AuditEvent,
    Result,
};

use crate::router::AppState;

/// Free text: anything that parses as `<amount> [category] [note]` is recorded.
pub(crate) async fn handle_text(
    state: &AppState,
    sender: &Sender,
    text: &str,
    now: DateTime<Utc>,
) -> String {
    let Some(parsed) = parse_expense(text) else {
        return report::NOT_UNDERSTOOD.to_string();
    };

    match record(state, sender, parsed, now).await {
        Ok(reply) => {
            state.audit.record(AuditEvent::expense(sender, text));
            reply
        }
        Err(e) => {
            tracing::error!("failed to save expense for {}: {e}", sender.user_id.0);
            state
                .audit
                .record(AuditEvent::error(sender, text, &e.to_string()));
            report::SAVE_FAILED.to_string()
        }
    }
}

pub(crate) async fn record(
    state: &AppState,
    sender: &Sender,
    parsed: ParsedExpense,
    now: DateTime<Utc>,
) -> Result<String> {
    let expense = state
        .store
        .add_expense(NewExpense {
            user_id: sender.user_id,
            username: Some(sender.display_name.clone()),
            amount: parsed.amount,
            category: parsed.category,
            note: parsed.note,
            created_at: now,
        })
        .await?;

    tracing::info!(
        "logged {} ({}) for {} [{}]",
        expense.amount,
        expense.category,
        sender.display_name,
        sender.user_id.0
    );
    Ok(report::logged(
        expense.amount,
        &expense.category,
        &state.cfg.currency,
    ))
}
