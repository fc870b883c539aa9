use async_trait::async_trait;

use crate::app_error::AppResult;

/// Recomputes a customer's aggregate subscription status after a tick.
#[async_trait]
pub trait CustomerStatusNotifier: Send + Sync {
    async fn refresh(&self, customer: &str) -> AppResult<()>;
}
