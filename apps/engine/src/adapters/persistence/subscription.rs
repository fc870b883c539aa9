use async_trait::async_trait;
use chrono::NaiveDate;
use recurring_types::{BillingPeriod, Money, SubscriptionStatus};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_text},
    app_error::{AppError, AppResult},
    application::use_cases::subscription::SubscriptionRepo,
    domain::entities::{
        payment_channel::PaymentChannelKind, plan_line::PlanLine, subscription::Subscription,
    },
};

fn row_to_subscription(row: &sqlx::postgres::PgRow) -> AppResult<Subscription> {
    let interval: String = row.get("interval");
    let status: String = row.get("status");
    let current_period = match (
        row.get::<Option<NaiveDate>, _>("current_period_start"),
        row.get::<Option<NaiveDate>, _>("current_period_end"),
    ) {
        (Some(start), Some(end)) => Some(BillingPeriod::new(start, end)?),
        _ => None,
    };

    Ok(Subscription {
        id: row.get("id"),
        customer: row.get("customer"),
        currency: row.get("currency"),
        interval: parse_text(&interval)?,
        interval_count: row.get::<i32, _>("interval_count").max(0) as u32,
        start_date: row.get("start_date"),
        trial_start: row.get("trial_start"),
        trial_end: row.get("trial_end"),
        current_period,
        cancellation_date: row.get("cancellation_date"),
        invoice_timing: row.get("invoice_timing"),
        prorate_last_invoice: row.get("prorate_last_invoice"),
        auto_order: row.get("auto_order"),
        auto_payment_request: row.get("auto_payment_request"),
        days_until_due: row.get::<i32, _>("days_until_due").max(0) as u32,
        additional_discount_percentage: row.get("additional_discount_percentage"),
        additional_discount_amount: row.get("additional_discount_amount"),
        price_list: row.get("price_list"),
        payment_channel: row.get::<Option<PaymentChannelKind>, _>("payment_channel"),
        status: parse_text(&status)?,
        total: row.get("total"),
        grand_total: row.get("grand_total"),
        last_error: row.get("last_error"),
        billing_closed: row.get("billing_closed"),
        plan_lines: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_plan_line(row: &sqlx::postgres::PgRow) -> PlanLine {
    PlanLine {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        item_code: row.get("item_code"),
        description: row.get("description"),
        quantity: row.get("quantity"),
        price_determination: row.get("price_determination"),
        fixed_rate: row.get("fixed_rate"),
        from_date: row.get("from_date"),
        to_date: row.get("to_date"),
        status: row.get("status"),
        rate: row.get("rate"),
        position: row.get("position"),
    }
}

const SELECT_COLS: &str = r#"
    id, customer, currency, interval, interval_count, start_date, trial_start, trial_end,
    current_period_start, current_period_end, cancellation_date, invoice_timing,
    prorate_last_invoice, auto_order, auto_payment_request, days_until_due,
    additional_discount_percentage, additional_discount_amount, price_list, payment_channel,
    status, total, grand_total, last_error, billing_closed, created_at, updated_at
"#;

const PLAN_LINE_COLS: &str = r#"
    id, subscription_id, item_code, description, quantity, price_determination, fixed_rate,
    from_date, to_date, status, rate, position
"#;

impl PostgresPersistence {
    async fn plan_lines_for(&self, subscription_id: Uuid) -> AppResult<Vec<PlanLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plan_lines WHERE subscription_id = $1 ORDER BY position, id",
            PLAN_LINE_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_plan_line).collect())
    }

    async fn insert_plan_line<'e, E>(executor: E, line: &PlanLine) -> AppResult<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO plan_lines
                (id, subscription_id, item_code, description, quantity, price_determination,
                 fixed_rate, from_date, to_date, status, rate, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(line.id)
        .bind(line.subscription_id)
        .bind(&line.item_code)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.price_determination)
        .bind(line.fixed_rate)
        .bind(line.from_date)
        .bind(line.to_date)
        .bind(line.status)
        .bind(line.rate)
        .bind(line.position)
        .execute(executor)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn create(&self, subscription: &Subscription) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (id, customer, currency, interval, interval_count, start_date, trial_start,
                 trial_end, current_period_start, current_period_end, cancellation_date,
                 invoice_timing, prorate_last_invoice, auto_order, auto_payment_request,
                 days_until_due, additional_discount_percentage, additional_discount_amount,
                 price_list, payment_channel, status, total, grand_total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(subscription.id)
        .bind(&subscription.customer)
        .bind(&subscription.currency)
        .bind(subscription.interval.as_str())
        .bind(subscription.interval_count as i32)
        .bind(subscription.start_date)
        .bind(subscription.trial_start)
        .bind(subscription.trial_end)
        .bind(subscription.current_period.map(|p| p.start))
        .bind(subscription.current_period.map(|p| p.end))
        .bind(subscription.cancellation_date)
        .bind(subscription.invoice_timing)
        .bind(subscription.prorate_last_invoice)
        .bind(subscription.auto_order)
        .bind(subscription.auto_payment_request)
        .bind(subscription.days_until_due as i32)
        .bind(subscription.additional_discount_percentage)
        .bind(subscription.additional_discount_amount)
        .bind(&subscription.price_list)
        .bind(subscription.payment_channel)
        .bind(subscription.status.as_str())
        .bind(subscription.total)
        .bind(subscription.grand_total)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        for line in &subscription.plan_lines {
            Self::insert_plan_line(&mut *tx, line).await?;
        }

        tx.commit().await.map_err(AppError::from)?;

        self.get_by_id(subscription.id)
            .await?
            .ok_or_else(|| AppError::Internal("Subscription vanished after insert".into()))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut subscription = row_to_subscription(&row)?;
        subscription.plan_lines = self.plan_lines_for(id).await?;
        Ok(Some(subscription))
    }

    async fn list_processable(&self, after: Option<Uuid>, limit: i64) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM subscriptions
            WHERE (status <> $1 OR NOT billing_closed) AND ($2::uuid IS NULL OR id > $2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(SubscriptionStatus::Cancelled.as_str())
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(ids)
    }

    async fn update_period(&self, id: Uuid, period: Option<BillingPeriod>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET current_period_start = $2, current_period_end = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(period.map(|p| p.start))
        .bind(period.map(|p| p.end))
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn close_billing(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET billing_closed = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        last_error: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET status = $2, last_error = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(last_error)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn update_totals(&self, id: Uuid, total: Money, grand_total: Money) -> AppResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET total = $2, grand_total = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(total)
        .bind(grand_total)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn update_plan_lines(&self, lines: &[PlanLine]) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        for line in lines {
            sqlx::query("UPDATE plan_lines SET status = $2, rate = $3 WHERE id = $1")
                .bind(line.id)
                .bind(line.status)
                .bind(line.rate)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from)?;
        }
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn add_plan_line(&self, line: &PlanLine) -> AppResult<PlanLine> {
        Self::insert_plan_line(&self.pool, line).await?;
        Ok(line.clone())
    }

    async fn set_plan_line_end(
        &self,
        subscription_id: Uuid,
        line_id: Uuid,
        to_date: NaiveDate,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE plan_lines SET to_date = $3 WHERE id = $2 AND subscription_id = $1",
        )
        .bind(subscription_id)
        .bind(line_id)
        .bind(to_date)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn set_cancellation(
        &self,
        id: Uuid,
        cancellation_date: NaiveDate,
        prorate_last_invoice: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET cancellation_date = $2, prorate_last_invoice = $3, billing_closed = FALSE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(cancellation_date)
        .bind(prorate_last_invoice)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
