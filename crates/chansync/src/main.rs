use std::sync::Arc;

use chansync_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), chansync_core::Error> {
    chansync_core::logging::init("chansync")?;

    let cfg = Arc::new(Config::load()?);

    chansync_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| chansync_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
