//! User-facing reply texts (Telegram HTML).

use crate::{
    formatting::escape_html,
    ledger::{Expense, Total},
    money::Money,
    stats::{Forecast, Summary},
    timezone::Zone,
};

pub const UNAUTHORIZED: &str = "🚫 You are not allowed to use this bot.";
pub const SAVE_FAILED: &str = "❌ Failed to save expense.";
pub const QUERY_FAILED: &str = "❌ Could not read expenses right now. Try again later.";
pub const SPENT_USAGE: &str = "Usage: /spent &lt;amount&gt; [category] [note]";
pub const SETBUDGET_USAGE: &str = "Usage: /setbudget &lt;amount&gt;";
pub const INVALID_AMOUNT: &str = "Invalid amount.";
pub const NOTHING_TO_UNDO: &str = "Nothing to undo.";
pub const NOT_UNDERSTOOD: &str =
    "I didn't understand. Send <code>/spent 50 food note</code> or just <code>50 food note</code>.";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /summary, /spent, /daily, /predict or /help.";

pub fn greeting() -> String {
    "👋 Hi! Send expenses like <code>50 food lunch</code> or <code>/spent 50 food lunch</code>.\n\
     Use /summary for stats and /help for all commands."
        .to_string()
}

pub fn help() -> String {
    [
        "<b>Logging</b>",
        "<code>50 food lunch</code> or /spent &lt;amount&gt; [category] [note]",
        "/undo remove your last expense this month",
        "",
        "<b>Totals</b>",
        "/today (/daily) your spending today",
        "/me your spending this month",
        "/monthly (/total) everyone's spending this month",
        "/categories this month by category",
        "/recent [n] your latest expenses",
        "",
        "<b>Budget</b>",
        "/summary full monthly report",
        "/predict month-end forecast",
        "/budget, /setbudget &lt;amount&gt;",
        "/balance remaining budget",
        "/daysleft days left in the month",
        "/whoami your user and chat ids",
    ]
    .join("\n")
}

fn amount(m: Money, currency: &str) -> String {
    format!("{m} {}", escape_html(currency))
}

pub fn logged(m: Money, category: &str, currency: &str) -> String {
    let category = if category.is_empty() {
        "uncategorized"
    } else {
        category
    };
    format!("✅ Logged {} ({})", amount(m, currency), escape_html(category))
}

pub fn today_total(m: Money, currency: &str) -> String {
    format!("Your spending today: {}", amount(m, currency))
}

pub fn month_total(m: Money, currency: &str) -> String {
    format!("This month's total: {}", amount(m, currency))
}

pub fn me_total(m: Money, currency: &str) -> String {
    format!("You spent {} this month.", amount(m, currency))
}

pub fn undone(e: &Expense, currency: &str) -> String {
    format!(
        "✅ Last expense removed: {} ({}).",
        amount(e.amount, currency),
        escape_html(if e.category.is_empty() {
            "uncategorized"
        } else {
            &e.category
        })
    )
}

pub fn predict(f: &Forecast, currency: &str) -> String {
    let verdict = if f.will_exceed {
        "⚠️ You will exceed budget!"
    } else {
        "✅ On track"
    };
    format!("Forecast: {}. {verdict}", amount(f.predicted, currency))
}

pub fn budget(b: Money, currency: &str) -> String {
    format!("Budget: {}", amount(b, currency))
}

pub fn budget_updated(b: Money, currency: &str) -> String {
    format!("✅ Budget updated to {}", amount(b, currency))
}

pub fn balance(f: &Forecast, currency: &str) -> String {
    format!("Remaining this month: {}", amount(f.remaining, currency))
}

pub fn days_left(f: &Forecast) -> String {
    format!("Days left: {} of {}", f.days_left, f.days_in_month)
}

pub fn whoami(user_id: i64, chat_id: i64) -> String {
    format!("Your ID: <code>{user_id}</code>\nChat ID: <code>{chat_id}</code>")
}

pub fn summary(s: &Summary, currency: &str) -> String {
    let f = &s.forecast;
    let mut lines = vec![
        format!("📊 <b>Summary - {}</b>", escape_html(&s.month_label)),
        format!("Today: {}", amount(f.total_today, currency)),
        format!("Month: {}", amount(f.total_month, currency)),
        format!(
            "Remaining: {} (Budget {})",
            amount(f.remaining, currency),
            amount(f.budget, currency)
        ),
        format!("Days left: {}", f.days_left),
        format!(
            "Forecast: {}{}",
            amount(f.predicted, currency),
            if f.will_exceed { " ⚠️" } else { "" }
        ),
        String::new(),
        "🔎 <b>By user:</b>".to_string(),
    ];
    if s.by_user.is_empty() {
        lines.push("- nothing logged yet".to_string());
    }
    for t in &s.by_user {
        lines.push(format!(
            "- {}: {}",
            escape_html(&t.label),
            amount(t.amount, currency)
        ));
    }
    lines.join("\n")
}

pub fn categories(month_label: &str, totals: &[Total], currency: &str) -> String {
    if totals.is_empty() {
        return format!("No expenses in {} yet.", escape_html(month_label));
    }
    let mut lines = vec![format!(
        "🗂 <b>By category - {}</b>",
        escape_html(month_label)
    )];
    for t in totals {
        lines.push(format!(
            "- {}: {}",
            escape_html(&t.label),
            amount(t.amount, currency)
        ));
    }
    lines.join("\n")
}

pub fn recent(expenses: &[Expense], tz: Zone, currency: &str) -> String {
    if expenses.is_empty() {
        return "No expenses yet.".to_string();
    }
    let mut lines = vec!["🧾 <b>Recent expenses</b>".to_string()];
    for e in expenses {
        let when = tz.local(e.created_at).format("%m-%d %H:%M");
        let mut line = format!("- {when} {}", amount(e.amount, currency));
        if !e.category.is_empty() {
            line.push_str(&format!(" {}", escape_html(&e.category)));
        }
        if !e.note.is_empty() {
            line.push_str(&format!(" <i>{}</i>", escape_html(&e.note)));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn daily_report(f: &Forecast, currency: &str) -> String {
    let verdict = if f.will_exceed {
        "⚠️ Over budget"
    } else {
        "✅ On track"
    };
    [
        "⏰ <b>Daily Budget Summary</b>".to_string(),
        format!("Today: {}", amount(f.total_today, currency)),
        format!("This month: {}", amount(f.total_month, currency)),
        format!("Days left: {} / {}", f.days_left, f.days_in_month),
        format!(
            "Budget: {}, Remaining: {}",
            amount(f.budget, currency),
            amount(f.remaining, currency)
        ),
        format!("Predicted end: {} {verdict}", amount(f.predicted, currency)),
    ]
    .join("\n")
}
