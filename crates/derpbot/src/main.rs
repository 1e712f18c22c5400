use std::sync::Arc;

use derpbot_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), derpbot_core::Error> {
    derpbot_core::logging::init("derpbot")?;

    let cfg = Arc::new(Config::load()?);

    derpbot_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| derpbot_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    tracing::info!("dispatcher stopped, shutting down");

    Ok(())
}
