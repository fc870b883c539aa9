use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    application::{
        ports::{
            clock::Clock, customer_notifier::CustomerStatusNotifier,
            document_store::DocumentStore, ledger::LedgerStore, pricing::PricingService,
        },
        use_cases::{
            billing_cycle::BillingCycleUseCases, payment_channel_factory::PaymentChannelFactory,
            subscription::{SubscriptionRepo, SubscriptionUseCases},
        },
    },
    infra::{
        clock::SystemClock,
        config::{AppConfig, LogFormat},
        postgres_persistence,
    },
};

/// Wired use cases for the engine process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub billing: Arc<BillingCycleUseCases>,
    pub subscriptions: Arc<SubscriptionUseCases>,
}

pub async fn init_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let postgres_arc =
        Arc::new(postgres_persistence(&config.database_url, config.database_max_connections).await?);

    let subscription_repo = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let ledger = postgres_arc.clone() as Arc<dyn LedgerStore>;
    let documents = postgres_arc.clone() as Arc<dyn DocumentStore>;
    let pricing = postgres_arc.clone() as Arc<dyn PricingService>;
    let notifier = postgres_arc.clone() as Arc<dyn CustomerStatusNotifier>;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let channels = Arc::new(PaymentChannelFactory::new(config.payment_channels.clone()));

    let billing = BillingCycleUseCases::new(
        subscription_repo.clone(),
        ledger.clone(),
        documents,
        pricing,
        notifier,
        channels.clone(),
        clock.clone(),
    );

    let subscriptions = SubscriptionUseCases::new(
        subscription_repo,
        ledger,
        channels,
        clock,
        config.default_price_list.clone(),
    );

    Ok(AppState {
        config: Arc::new(config),
        billing: Arc::new(billing),
        subscriptions: Arc::new(subscriptions),
    })
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "recurring_engine=info,sqlx=warn".into());

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            // Console (pretty logs)
            let console_layer = fmt::layer()
                .with_target(false) // don’t show target (module path)
                .with_level(true)
                .pretty();
            registry.with(console_layer).try_init().ok();
        }
        LogFormat::Json => {
            // Structured JSON logs on stdout for collectors
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true);
            registry.with(json_layer).try_init().ok();
        }
    }
}
