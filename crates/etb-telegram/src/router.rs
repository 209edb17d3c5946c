use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use etb_core::{
    config::Config,
    ledger::ExpenseStore,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    scheduler::ReportScheduler,
    stats::StatsService,
    utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<dyn ExpenseStore>,
    pub stats: StatsService,
    pub messenger: Arc<dyn MessagingPort>,
    pub audit: Arc<AuditLogger>,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn ExpenseStore>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let stats = StatsService::new(store.clone(), cfg.timezone, cfg.monthly_budget);
        let audit = Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ));
        Self {
            cfg,
            store,
            stats,
            messenger,
            audit,
        }
    }
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn ExpenseStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!("expense bot started: @{}", me.username()),
        Err(e) => tracing::warn!("getMe failed (continuing): {e}"),
    }
    tracing::info!(
        "timezone {}, currency {}, allowed users: {}",
        cfg.timezone,
        cfg.currency,
        if cfg.allowed_users.is_empty() {
            "everyone".to_string()
        } else {
            cfg.allowed_users.len().to_string()
        }
    );

    if let Err(e) = bot.set_my_commands(command_menu()).await {
        tracing::warn!("failed to publish command menu: {e}");
    }

    // Keep a RetryAfter retry in the Telegram adapter as well; throttling only reduces 429s.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState::new(cfg.clone(), store, messenger.clone()));

    let scheduler = ReportScheduler::from_config(&cfg, state.stats.clone(), messenger);
    if let Some(s) = &scheduler {
        s.start().await;
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            tracing::debug!("ignoring unhandled update: {upd:?}");
        })
        .build()
        .dispatch()
        .await;

    if let Some(s) = scheduler {
        s.stop().await;
    }
    tracing::info!("dispatcher stopped");
    Ok(())
}

fn command_menu() -> Vec<BotCommand> {
    [
        ("spent", "Log an expense: /spent 50 food lunch"),
        ("today", "Your spending today"),
        ("me", "Your spending this month"),
        ("monthly", "Everyone's spending this month"),
        ("summary", "Monthly summary with forecast"),
        ("predict", "Month-end forecast"),
        ("categories", "This month by category"),
        ("recent", "Your latest expenses"),
        ("undo", "Remove your last expense"),
        ("budget", "Show the monthly budget"),
        ("setbudget", "Change the monthly budget"),
        ("balance", "Remaining budget"),
        ("daysleft", "Days left this month"),
        ("help", "All commands"),
    ]
    .into_iter()
    .map(|(cmd, desc)| BotCommand::new(cmd, desc))
    .collect()
}
