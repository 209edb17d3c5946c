//! Parsing of chat text into expenses and commands.

use crate::money::Money;

/// Amounts above this are rejected as typos.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000;
/// Longer categories and notes are cut so every reply line stays well under a Telegram message.
pub const MAX_CATEGORY_CHARS: usize = 32;
pub const MAX_NOTE_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedExpense {
    pub amount: Money,
    pub category: String,
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased name without the leading `/` or `@botname` suffix.
    pub name: String,
    pub args: Vec<String>,
}

/// Parse `"<amount> [category] [note...]"`, optionally prefixed with `/spent` or `add `.
///
/// Returns `None` when there is no amount, the amount is not a decimal, or it is not positive.
pub fn parse_expense(text: &str) -> Option<ParsedExpense> {
    let mut t = text.trim();

    if let Some(rest) = strip_command(t, "spent") {
        t = rest;
    }
    if t.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("add ")) {
        t = t[4..].trim_start();
    }

    let mut parts = t.split_whitespace();
    let amount: Money = parts.next()?.parse().ok()?;
    if !amount.is_positive() || amount > Money::from_units(MAX_AMOUNT_UNITS) {
        return None;
    }

    let category = parts
        .next()
        .map(|c| clip(&c.to_lowercase(), MAX_CATEGORY_CHARS))
        .unwrap_or_default();
    let note = clip(&parts.collect::<Vec<_>>().join(" "), MAX_NOTE_CHARS);

    Some(ParsedExpense {
        amount,
        category,
        note,
    })
}

/// Split a slash command. Telegram may send `/cmd@botname arg1 ...`.
pub fn parse_command(text: &str) -> ParsedCommand {
    let mut parts = text.split_whitespace();
    let name = parts
        .next()
        .unwrap_or("")
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    ParsedCommand {
        name,
        args: parts.map(|s| s.to_string()).collect(),
    }
}

fn clip(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Strip `/<name>` (and an optional `@botname`) from the front of `text`, ignoring case.
fn strip_command<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix('/')?;
    if !rest.get(..name.len())?.eq_ignore_ascii_case(name) {
        return None;
    }
    let rest = &rest[name.len()..];
    if let Some(after_at) = rest.strip_prefix('@') {
        let end = after_at
            .find(char::is_whitespace)
            .unwrap_or(after_at.len());
        return Some(after_at[end..].trim_start());
    }
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return Some(rest.trim_start());
    }
    None
}
