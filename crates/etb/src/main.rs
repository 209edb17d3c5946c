use std::sync::Arc;

use etb_core::{
    config::Config,
    ledger::{ExpenseStore, SqliteLedger},
};

#[tokio::main]
async fn main() -> Result<(), etb_core::Error> {
    etb_core::logging::init("etb")?;

    let cfg = Arc::new(Config::load()?);

    let ledger = SqliteLedger::open(&cfg.database_path)?;
    ledger.init(cfg.monthly_budget).await?;
    tracing::info!("ledger ready at {}", cfg.database_path.display());
    let store: Arc<dyn ExpenseStore> = Arc::new(ledger);

    etb_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| etb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
