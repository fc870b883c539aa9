use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::application::use_cases::billing_cycle::{BillingCycleUseCases, ProcessOptions};

/// Settings for the scheduled billing run.
#[derive(Debug, Clone, Copy)]
pub struct BillingWorkerSettings {
    pub tick_secs: u64,
    pub batch_size: i64,
    pub max_concurrent: usize,
    pub options: ProcessOptions,
}

pub async fn run_billing_loop(billing_uc: Arc<BillingCycleUseCases>, settings: BillingWorkerSettings) {
    let mut ticker = interval(Duration::from_secs(settings.tick_secs));
    // A slow run must not trigger a burst of catch-up runs
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Billing worker started (running every {}s, max {} concurrent)",
        settings.tick_secs, settings.max_concurrent
    );

    loop {
        ticker.tick().await;
        run_once(&billing_uc, &settings).await;
    }
}

/// One billing run over every processable subscription.
pub async fn run_once(billing_uc: &Arc<BillingCycleUseCases>, settings: &BillingWorkerSettings) {
    match billing_uc
        .process_all(settings.options, settings.batch_size, settings.max_concurrent)
        .await
    {
        Ok(report) if report.failed.is_empty() => {
            info!(processed = report.processed, "Billing run complete");
        }
        Ok(report) => {
            warn!(
                processed = report.processed,
                failed = report.failed.len(),
                failures = %serde_json::to_string(&report.failed).unwrap_or_default(),
                "Billing run complete with failures"
            );
        }
        Err(e) => {
            error!(error = %e, "Billing run aborted");
        }
    }
}
