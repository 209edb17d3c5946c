use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    formatting::escape_html,
    messaging::types::MessagingCapabilities,
    Result,
};

/// Outbound messaging port.
///
/// Replies, command answers and the daily report all go through this trait so the
/// core can be exercised without a live bot.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Send Telegram-flavoured HTML. Callers escape user content.
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send plain text. Messengers without a plain mode get it escaped as HTML.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.send_html(chat_id, &escape_html(text)).await
    }
}
