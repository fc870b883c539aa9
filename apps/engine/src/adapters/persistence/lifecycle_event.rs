use async_trait::async_trait;
use chrono::NaiveDate;
use recurring_types::{BillingPeriod, DocumentType, SubscriptionStatus};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_text},
    app_error::{AppError, AppResult},
    application::ports::ledger::LedgerStore,
    domain::entities::{
        generated_document::DocumentRef,
        lifecycle_event::{LifecycleEvent, LifecycleEventType},
    },
};

fn period_from(
    row: &sqlx::postgres::PgRow,
    start_col: &str,
    end_col: &str,
) -> AppResult<Option<BillingPeriod>> {
    match (
        row.get::<Option<NaiveDate>, _>(start_col),
        row.get::<Option<NaiveDate>, _>(end_col),
    ) {
        (Some(start), Some(end)) => Ok(Some(BillingPeriod::new(start, end)?)),
        _ => Ok(None),
    }
}

fn optional_status(value: Option<String>) -> AppResult<Option<SubscriptionStatus>> {
    value.as_deref().map(parse_text).transpose()
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> AppResult<LifecycleEvent> {
    let document_type: Option<String> = row.get("document_type");
    Ok(LifecycleEvent {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        event_type: row.get("event_type"),
        document_type: document_type.as_deref().map(parse_text).transpose()?,
        document_ref: row
            .get::<Option<String>, _>("document_ref")
            .map(DocumentRef::new),
        period: period_from(row, "period_start", "period_end")?,
        previous_period: period_from(row, "previous_period_start", "previous_period_end")?,
        previous_status: optional_status(row.get("previous_status"))?,
        new_status: optional_status(row.get("new_status"))?,
        message: row.get("message"),
        cancelled: row.get("cancelled"),
        created_at: row.get("created_at"),
    })
}

fn rows_to_events(rows: Vec<sqlx::postgres::PgRow>) -> AppResult<Vec<LifecycleEvent>> {
    rows.iter().map(row_to_event).collect()
}

const SELECT_COLS: &str = r#"
    id, subscription_id, event_type, document_type, document_ref, period_start, period_end,
    previous_period_start, previous_period_end, previous_status, new_status, message,
    cancelled, created_at
"#;

const INSERT: &str = r#"
    INSERT INTO lifecycle_events
        (id, subscription_id, event_type, document_type, document_ref, period_start,
         period_end, previous_period_start, previous_period_end, previous_status,
         new_status, message, cancelled, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
"#;

fn bind_event<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    event: &'q LifecycleEvent,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(event.id)
        .bind(event.subscription_id)
        .bind(event.event_type)
        .bind(event.document_type.map(|t| t.as_str()))
        .bind(event.document_ref.as_ref().map(DocumentRef::as_str))
        .bind(event.period.map(|p| p.start))
        .bind(event.period.map(|p| p.end))
        .bind(event.previous_period.map(|p| p.start))
        .bind(event.previous_period.map(|p| p.end))
        .bind(event.previous_status.map(|s| s.as_str()))
        .bind(event.new_status.map(|s| s.as_str()))
        .bind(&event.message)
        .bind(event.cancelled)
        .bind(event.created_at)
}

#[async_trait]
impl LedgerStore for PostgresPersistence {
    async fn append(&self, event: &LifecycleEvent) -> AppResult<()> {
        bind_event(sqlx::query(INSERT), event)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn insert_event_if_absent(&self, event: &LifecycleEvent) -> AppResult<bool> {
        if !event.is_document_event() || event.period.is_none() {
            return Err(AppError::InvalidInput(
                "Document events need a document type and period".into(),
            ));
        }

        // Conflict target matches the partial unique index on live document events
        let sql = format!(
            "{} ON CONFLICT (subscription_id, document_type, period_start, period_end) \
             WHERE NOT cancelled AND document_type IS NOT NULL DO NOTHING",
            INSERT
        );
        let result = bind_event(sqlx::query(&sql), event)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_event(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        period: &BillingPeriod,
    ) -> AppResult<Option<LifecycleEvent>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM lifecycle_events
            WHERE subscription_id = $1 AND document_type = $2
              AND period_start = $3 AND period_end = $4 AND NOT cancelled
            "#,
            SELECT_COLS
        ))
        .bind(subscription_id)
        .bind(document_type.as_str())
        .bind(period.start)
        .bind(period.end)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn attach_document(&self, event_id: Uuid, document_ref: &DocumentRef) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE lifecycle_events SET document_ref = $2 WHERE id = $1 AND NOT cancelled",
        )
        .bind(event_id)
        .bind(document_ref.as_str())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn release_reservation(&self, event_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE lifecycle_events SET cancelled = TRUE WHERE id = $1 AND document_ref IS NULL",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn find_period_change(
        &self,
        subscription_id: Uuid,
        period: &BillingPeriod,
    ) -> AppResult<Option<LifecycleEvent>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM lifecycle_events
            WHERE subscription_id = $1 AND event_type = $2
              AND period_start = $3 AND period_end = $4 AND NOT cancelled
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SELECT_COLS
        ))
        .bind(subscription_id)
        .bind(LifecycleEventType::PeriodAdvanced)
        .bind(period.start)
        .bind(period.end)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<LifecycleEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM lifecycle_events WHERE subscription_id = $1 ORDER BY created_at, id",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        rows_to_events(rows)
    }

    async fn cancel_for_document(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        document_ref: &DocumentRef,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE lifecycle_events SET cancelled = TRUE
            WHERE subscription_id = $1 AND document_type = $2 AND document_ref = $3
              AND NOT cancelled
            "#,
        )
        .bind(subscription_id)
        .bind(document_type.as_str())
        .bind(document_ref.as_str())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }

    async fn cancel_for_subscription(&self, subscription_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE lifecycle_events SET cancelled = TRUE WHERE subscription_id = $1 AND NOT cancelled",
        )
        .bind(subscription_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
