//! Telegram update handlers.
//!
//! Every message is turned into a `Sender` + text, answered by `respond()`, and the
//! reply is sent back through the (throttled) messenger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use teloxide::{prelude::*, types::Message};

use etb_core::{
    domain::{ChatId, Sender, UserId},
    formatting::{html_to_plain, split_lines},
    report,
    security::is_authorized,
    utils::AuditEvent,
};

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(sender) = sender_of(&msg) else {
        return Ok(());
    };
    let text = msg.text().unwrap_or("").trim();
    tracing::info!(
        "received from {} ({}): {}",
        sender.display_name,
        sender.user_id.0,
        text
    );

    let reply = respond(&state, &sender, text, Utc::now()).await;
    send_reply(&state, sender.chat_id, &reply).await;
    Ok(())
}

/// Compute the reply for one incoming text. Never fails: errors become user-facing text.
pub async fn respond(state: &AppState, sender: &Sender, text: &str, now: DateTime<Utc>) -> String {
    if !is_authorized(sender.user_id, &state.cfg.allowed_users) {
        tracing::warn!("unauthorized user {} ({})", sender.display_name, sender.user_id.0);
        state.audit.record(AuditEvent::auth(sender, false));
        return report::UNAUTHORIZED.to_string();
    }

    if text.starts_with('/') {
        return commands::handle_command(state, sender, text, now).await;
    }
    text::handle_text(state, sender, text, now).await
}

/// Split and send. Lines are never cut in HTML mode: a reply with a line over the
/// limit goes out as plain text, where any cut is safe.
async fn send_reply(state: &AppState, chat_id: ChatId, html: &str) {
    let caps = state.messenger.capabilities();
    let limit = state
        .cfg
        .telegram_safe_limit
        .min(caps.max_message_len)
        .max(200);
    let oversized = html.split('\n').any(|line| line.len() > limit);

    if caps.supports_html && !oversized {
        for chunk in split_lines(html, limit) {
            if let Err(e) = state.messenger.send_html(chat_id, &chunk).await {
                tracing::error!("send to chat {} failed: {e}", chat_id.0);
            }
        }
        return;
    }

    if oversized {
        tracing::debug!("reply to chat {} has a line over {limit} bytes; sending as plain text", chat_id.0);
    }
    for chunk in split_lines(&html_to_plain(html), limit) {
        if let Err(e) = state.messenger.send_text(chat_id, &chunk).await {
            tracing::error!("send to chat {} failed: {e}", chat_id.0);
        }
    }
}

/// Display name preference: first name, then @username, then the numeric id.
fn sender_of(msg: &Message) -> Option<Sender> {
    let user = msg.from()?;
    let display_name = if !user.first_name.trim().is_empty() {
        user.first_name.clone()
    } else if let Some(username) = &user.username {
        username.clone()
    } else {
        user.id.0.to_string()
    };

    Some(Sender {
        user_id: UserId(user.id.0 as i64),
        chat_id: ChatId(msg.chat.id.0),
        display_name,
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex as StdMutex};

    use async_trait::async_trait;
    use chrono::TimeZone;

    use etb_core::{
        config::Config,
        domain::{MessageId, MessageRef},
        ledger::{ExpenseStore, SqliteLedger},
        messaging::{port::MessagingPort, types::MessagingCapabilities},
        money::Money,
        parsing::MAX_NOTE_CHARS,
    };

    use super::*;

    #[derive(Default)]
    struct Recorder {
        html: StdMutex<Vec<String>>,
        text: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl MessagingPort for Recorder {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> etb_core::Result<MessageRef> {
            let mut sent = self.html.lock().unwrap();
            sent.push(html.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(sent.len() as i32),
            })
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> etb_core::Result<MessageRef> {
            let mut sent = self.text.lock().unwrap();
            sent.push(text.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(sent.len() as i32),
            })
        }
    }

    async fn state_with(extra: &[(&str, &str)]) -> (AppState, Arc<Recorder>) {
        let mut env: HashMap<String, String> = HashMap::new();
        env.insert("TELEGRAM_TOKEN".into(), "123:abc".into());
        env.insert(
            "AUDIT_LOG_PATH".into(),
            format!("/tmp/etb-handlers-{}.log", std::process::id()),
        );
        for (k, v) in extra {
            env.insert(k.to_string(), v.to_string());
        }
        let cfg = Config::from_source(|k| env.get(k).cloned()).unwrap();

        let ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.init(cfg.monthly_budget).await.unwrap();
        let recorder = Arc::new(Recorder::default());
        let state = AppState::new(Arc::new(cfg), Arc::new(ledger), recorder.clone());
        (state, recorder)
    }

    fn ann() -> Sender {
        Sender {
            user_id: UserId(1),
            chat_id: ChatId(10),
            display_name: "Ann".to_string(),
        }
    }

    fn bob() -> Sender {
        Sender {
            user_id: UserId(2),
            chat_id: ChatId(10),
            display_name: "Bob".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        // 12:00 in UTC+4 on April 10th.
        Utc.with_ymd_and_hms(2026, 4, 10, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn free_text_and_spent_are_recorded() {
        let (state, _) = state_with(&[]).await;
        assert_eq!(
            respond(&state, &ann(), "50 food lunch", now()).await,
            "✅ Logged 50.00 AED (food)"
        );
        assert_eq!(
            respond(&state, &bob(), "/spent 12.5", now()).await,
            "✅ Logged 12.50 AED (uncategorized)"
        );
        assert_eq!(
            respond(&state, &bob(), "/SPENT 3 Snacks", now()).await,
            "✅ Logged 3.00 AED (snacks)"
        );

        assert_eq!(
            respond(&state, &ann(), "/today", now()).await,
            "Your spending today: 50.00 AED"
        );
        assert_eq!(
            respond(&state, &bob(), "/me", now()).await,
            "You spent 15.50 AED this month."
        );
        assert_eq!(
            respond(&state, &ann(), "/total", now()).await,
            "This month's total: 65.50 AED"
        );

        let summary = respond(&state, &ann(), "/summary", now()).await;
        assert!(summary.contains("- Ann: 50.00 AED"));
        assert!(summary.contains("- Bob: 15.50 AED"));
    }

    #[tokio::test]
    async fn bad_input_gets_hints() {
        let (state, _) = state_with(&[]).await;
        assert_eq!(
            respond(&state, &ann(), "hello", now()).await,
            report::NOT_UNDERSTOOD
        );
        assert_eq!(
            respond(&state, &ann(), "/spent lunch", now()).await,
            report::SPENT_USAGE
        );
        assert_eq!(
            respond(&state, &ann(), "/frobnicate", now()).await,
            report::UNKNOWN_COMMAND
        );
        assert_eq!(
            respond(&state, &ann(), "/setbudget", now()).await,
            report::SETBUDGET_USAGE
        );
        assert_eq!(
            respond(&state, &ann(), "/setbudget -4", now()).await,
            report::INVALID_AMOUNT
        );
    }

    #[tokio::test]
    async fn budget_commands_update_forecast() {
        let (state, _) = state_with(&[]).await;
        assert_eq!(
            respond(&state, &ann(), "/budget", now()).await,
            "Budget: 300.00 AED"
        );
        assert_eq!(
            respond(&state, &ann(), "/setbudget 1,000", now()).await,
            "✅ Budget updated to 1000.00 AED"
        );
        respond(&state, &ann(), "100 rent", now()).await;

        assert_eq!(
            respond(&state, &ann(), "/balance", now()).await,
            "Remaining this month: 900.00 AED"
        );
        assert_eq!(
            respond(&state, &ann(), "/daysleft", now()).await,
            "Days left: 20 of 30"
        );
        // 100 over 10 days -> 300 projected, under the 1000 budget.
        assert_eq!(
            respond(&state, &ann(), "/predict", now()).await,
            "Forecast: 300.00 AED. ✅ On track"
        );
    }

    #[tokio::test]
    async fn undo_removes_only_own_last_expense() {
        let (state, _) = state_with(&[]).await;
        assert_eq!(
            respond(&state, &ann(), "/undo", now()).await,
            report::NOTHING_TO_UNDO
        );

        respond(&state, &ann(), "5 coffee", now()).await;
        respond(&state, &bob(), "7 snacks", now()).await;

        let reply = respond(&state, &ann(), "/undo", now()).await;
        assert!(reply.contains("5.00 AED (coffee)"));
        assert_eq!(
            state.stats.month_total(now(), None).await.unwrap(),
            Money::from_units(7)
        );
    }

    #[tokio::test]
    async fn allow_list_blocks_strangers() {
        let (state, _) = state_with(&[("ALLOWED_USER_IDS", "1")]).await;
        assert_eq!(
            respond(&state, &bob(), "5 coffee", now()).await,
            report::UNAUTHORIZED
        );
        assert_eq!(
            state.store.recent(None, 10).await.unwrap().len(),
            0
        );
        assert!(respond(&state, &ann(), "5 coffee", now())
            .await
            .starts_with("✅"));
    }

    #[tokio::test]
    async fn categories_recent_and_whoami() {
        let (state, _) = state_with(&[]).await;
        respond(&state, &ann(), "5 coffee", now()).await;
        respond(&state, &ann(), "20 food dinner out", now()).await;

        let cats = respond(&state, &ann(), "/categories", now()).await;
        assert!(cats.contains("By category - 2026-04"));
        assert!(cats.find("food").unwrap() < cats.find("coffee").unwrap());

        let recent = respond(&state, &ann(), "/recent 1", now()).await;
        assert!(recent.contains("20.00 AED food <i>dinner out</i>"));
        assert!(!recent.contains("coffee"));

        assert_eq!(
            respond(&state, &ann(), "/whoami@expense_bot", now()).await,
            "Your ID: <code>1</code>\nChat ID: <code>10</code>"
        );
    }

    #[tokio::test]
    async fn long_replies_are_split() {
        let (state, recorder) = state_with(&[("TELEGRAM_SAFE_LIMIT", "200")]).await;
        let long = (0..40)
            .map(|i| format!("line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        send_reply(&state, ChatId(10), &long).await;

        let sent = recorder.html.lock().unwrap();
        assert!(sent.len() > 1);
        assert!(sent.iter().all(|chunk| chunk.len() <= 200));
        assert_eq!(sent.join("\n"), long);
        assert!(recorder.text.lock().unwrap().is_empty());
    }

    /// Every tag opened in a chunk is closed in it, and every `&` starts a whole entity.
    fn is_well_formed_html(chunk: &str) -> bool {
        let tags_balanced = ["b", "i", "code"].iter().all(|tag| {
            chunk.matches(&format!("<{tag}>")).count() == chunk.matches(&format!("</{tag}>")).count()
        });
        let entities_whole = chunk.match_indices('&').all(|(i, _)| {
            ["&amp;", "&lt;", "&gt;", "&quot;"]
                .iter()
                .any(|e| chunk[i..].starts_with(*e))
        });
        tags_balanced && entities_whole
    }

    #[tokio::test]
    async fn recent_with_long_escaped_note_stays_sendable() {
        let (state, recorder) = state_with(&[("TELEGRAM_SAFE_LIMIT", "200")]).await;
        let note = "<".repeat(1000);
        respond(&state, &ann(), &format!("5 coffee {note}"), now()).await;

        let reply = respond(&state, &ann(), "/recent", now()).await;
        // The stored note is clipped, and escaping still pushes its line past 200 bytes.
        assert!(reply.contains(&"&lt;".repeat(MAX_NOTE_CHARS)));
        send_reply(&state, ChatId(10), &reply).await;

        let html = recorder.html.lock().unwrap();
        assert!(html.iter().all(|chunk| is_well_formed_html(chunk)));

        let text = recorder.text.lock().unwrap();
        assert!(text.len() > 1);
        assert!(text.iter().all(|chunk| chunk.len() <= 200));
        let joined = text.concat();
        assert!(joined.starts_with("🧾 Recent expenses"));
        assert_eq!(joined.matches('<').count(), MAX_NOTE_CHARS);
        assert!(!joined.contains("&lt;"));
    }

    #[tokio::test]
    async fn short_html_replies_are_well_formed() {
        let (state, recorder) = state_with(&[("TELEGRAM_SAFE_LIMIT", "200")]).await;
        for i in 0..10 {
            respond(&state, &ann(), &format!("{} food <b>{i}</b> & more", i + 1), now()).await;
        }
        let reply = respond(&state, &ann(), "/recent 10", now()).await;
        send_reply(&state, ChatId(10), &reply).await;

        let html = recorder.html.lock().unwrap();
        assert!(html.len() > 1);
        assert!(html.iter().all(|chunk| is_well_formed_html(chunk)));
        assert!(recorder.text.lock().unwrap().is_empty());
    }
}
