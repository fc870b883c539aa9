use dotenvy::dotenv;
use tracing::info;

use recurring_engine::infra::{
    billing_worker::{BillingWorkerSettings, run_billing_loop, run_once},
    config::AppConfig,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let settings = BillingWorkerSettings {
        tick_secs: config.tick_secs,
        batch_size: config.batch_size,
        max_concurrent: config.max_concurrent,
        options: config.process_options(),
    };
    let app_state = init_app_state(config).await?;

    // `once` runs a single billing pass, for cron-style scheduling
    if std::env::args().nth(1).as_deref() == Some("once") {
        run_once(&app_state.billing, &settings).await;
        return Ok(());
    }

    let worker = tokio::spawn(run_billing_loop(app_state.billing.clone(), settings));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping billing worker");
    worker.abort();

    Ok(())
}
