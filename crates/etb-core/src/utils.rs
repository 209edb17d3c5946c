use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::Sender, errors::Error, Result};

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Truncate to `max_len` chars, appending `...` when shortened.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Expense,
    Command,
    Auth,
    Error,
}

/// One line of the audit trail: who did what to the ledger.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: AuditKind,
    pub user_id: i64,
    pub chat_id: i64,
    pub username: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(kind: AuditKind, sender: &Sender) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: kind,
            user_id: sender.user_id.0,
            chat_id: sender.chat_id.0,
            username: sender.display_name.clone(),
            content: None,
            authorized: None,
            error: None,
        }
    }

    /// A message that was recorded as an expense.
    pub fn expense(sender: &Sender, text: &str) -> Self {
        Self {
            content: Some(text.to_string()),
            ..Self::base(AuditKind::Expense, sender)
        }
    }

    pub fn command(sender: &Sender, text: &str) -> Self {
        Self {
            content: Some(text.to_string()),
            ..Self::base(AuditKind::Command, sender)
        }
    }

    pub fn auth(sender: &Sender, authorized: bool) -> Self {
        Self {
            authorized: Some(authorized),
            ..Self::base(AuditKind::Auth, sender)
        }
    }

    pub fn error(sender: &Sender, text: &str, error: &str) -> Self {
        Self {
            content: Some(text.to_string()),
            error: Some(error.to_string()),
            ..Self::base(AuditKind::Error, sender)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        event.content = event.content.map(|s| truncate_text(&s, AUDIT_MAX_TEXT));
        event.error = event.error.map(|s| truncate_text(&s, AUDIT_MAX_TEXT));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            writeln!(file, "{}", serde_json::to_string(&event)?)?;
            return Ok(());
        }

        let serde_json::Value::Object(fields) = serde_json::to_value(&event)? else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        let mut out = format!("\n{}", "=".repeat(60));
        for (k, v) in fields {
            let shown = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            out.push_str(&format!("\n{k}: {shown}"));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Write and swallow failures; the audit trail must never block a reply.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!("audit write to {} failed: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{ChatId, UserId};

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    fn sender() -> Sender {
        Sender {
            user_id: UserId(1),
            chat_id: ChatId(2),
            display_name: "Ann".to_string(),
        }
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn json_lines_are_truncated_and_tagged() {
        let log = AuditLogger::new(tmp_file("etb-audit-json"), true);
        let text = "x".repeat(AUDIT_MAX_TEXT + 1);
        log.write(AuditEvent::expense(&sender(), &text)).unwrap();
        log.write(AuditEvent::auth(&sender(), false)).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "expense");
        assert!(lines[0]["content"].as_str().unwrap().ends_with("..."));
        assert_eq!(lines[1]["event"], "auth");
        assert_eq!(lines[1]["authorized"], false);
        assert!(lines[1].get("content").is_none());
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn plain_format_lists_fields() {
        let log = AuditLogger::new(tmp_file("etb-audit-plain"), false);
        log.write(AuditEvent::error(&sender(), "50 food", "disk full"))
            .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: error"));
        assert!(written.contains("username: Ann"));
        assert!(written.contains("error: disk full"));
        let _ = std::fs::remove_file(log.path());
    }
}
