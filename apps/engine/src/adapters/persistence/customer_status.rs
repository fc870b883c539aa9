use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::customer_notifier::CustomerStatusNotifier,
};

/// A customer counts as active while any of their subscriptions is not cancelled.
#[async_trait]
impl CustomerStatusNotifier for PostgresPersistence {
    async fn refresh(&self, customer: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_status (customer, active_subscriptions, is_active, updated_at)
            SELECT $1, COUNT(*) FILTER (WHERE status <> 'cancelled'),
                   COUNT(*) FILTER (WHERE status <> 'cancelled') > 0, NOW()
            FROM subscriptions WHERE customer = $1
            ON CONFLICT (customer) DO UPDATE
            SET active_subscriptions = EXCLUDED.active_subscriptions,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(customer)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}
