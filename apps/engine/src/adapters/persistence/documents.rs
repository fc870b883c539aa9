use async_trait::async_trait;
use chrono::NaiveDate;
use recurring_types::{BillingPeriod, DocumentType, Money};
use rust_decimal::Decimal;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::document_store::DocumentStore,
    domain::entities::{
        generated_document::{
            CollectionRequestDraft, DocumentLine, DocumentRef, InvoiceDraft, OrderDraft,
            PaymentDraft,
        },
        payment_channel::PaymentChannelKind,
    },
};

/// Reference prefix per document type.
fn prefix(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Order => "SO",
        DocumentType::Invoice => "INV",
        DocumentType::Payment => "PAY",
        DocumentType::PaymentRequest => "PR",
    }
}

/// Columns shared by every document header.
struct Header<'a> {
    document_type: DocumentType,
    subscription_id: Uuid,
    customer: &'a str,
    currency: &'a str,
    period: BillingPeriod,
    posting_date: NaiveDate,
    secondary_date: Option<NaiveDate>,
    grand_total: Money,
    additional_discount_percentage: Decimal,
    additional_discount_amount: Money,
    reference_type: Option<DocumentType>,
    reference_doc: Option<&'a DocumentRef>,
    channel: Option<PaymentChannelKind>,
    paid_to_account: Option<&'a str>,
    transaction_ref: Option<&'a str>,
}

impl<'a> Header<'a> {
    fn new(
        document_type: DocumentType,
        subscription_id: Uuid,
        customer: &'a str,
        currency: &'a str,
        period: BillingPeriod,
        posting_date: NaiveDate,
        grand_total: Money,
    ) -> Self {
        Self {
            document_type,
            subscription_id,
            customer,
            currency,
            period,
            posting_date,
            secondary_date: None,
            grand_total,
            additional_discount_percentage: Decimal::ZERO,
            additional_discount_amount: Decimal::ZERO,
            reference_type: None,
            reference_doc: None,
            channel: None,
            paid_to_account: None,
            transaction_ref: None,
        }
    }
}

fn row_to_line(row: &sqlx::postgres::PgRow) -> DocumentLine {
    DocumentLine {
        item_code: row.get("item_code"),
        description: row.get("description"),
        quantity: row.get("quantity"),
        rate: row.get("rate"),
        amount: row.get("amount"),
    }
}

impl PostgresPersistence {
    async fn insert_document(
        &self,
        header: Header<'_>,
        lines: &[DocumentLine],
    ) -> AppResult<DocumentRef> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await.map_err(AppError::from)?;

        let number: i64 = sqlx::query_scalar("SELECT nextval('document_number_seq')")
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from)?;
        let reference = DocumentRef::new(format!("{}-{:06}", prefix(header.document_type), number));
        let document_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO documents
                (id, reference, document_type, subscription_id, customer, currency,
                 period_start, period_end, posting_date, secondary_date, grand_total,
                 additional_discount_percentage, additional_discount_amount,
                 reference_type, reference_doc, channel, paid_to_account, transaction_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18)
            "#,
        )
        .bind(document_id)
        .bind(reference.as_str())
        .bind(header.document_type.as_str())
        .bind(header.subscription_id)
        .bind(header.customer)
        .bind(header.currency)
        .bind(header.period.start)
        .bind(header.period.end)
        .bind(header.posting_date)
        .bind(header.secondary_date)
        .bind(header.grand_total)
        .bind(header.additional_discount_percentage)
        .bind(header.additional_discount_amount)
        .bind(header.reference_type.map(|t| t.as_str()))
        .bind(header.reference_doc.map(DocumentRef::as_str))
        .bind(header.channel)
        .bind(header.paid_to_account)
        .bind(header.transaction_ref)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        for (idx, line) in lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO document_lines
                    (document_id, idx, item_code, description, quantity, rate, amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(document_id)
            .bind(idx as i32)
            .bind(&line.item_code)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.rate)
            .bind(line.amount)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(reference)
    }

    async fn document_lines(&self, document_id: Uuid) -> AppResult<Vec<DocumentLine>> {
        let rows = sqlx::query(
            r#"
            SELECT item_code, description, quantity, rate, amount
            FROM document_lines WHERE document_id = $1 ORDER BY idx
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_line).collect())
    }
}

#[async_trait]
impl DocumentStore for PostgresPersistence {
    async fn create_order(&self, draft: &OrderDraft) -> AppResult<DocumentRef> {
        let header = Header {
            secondary_date: Some(draft.delivery_date),
            additional_discount_percentage: draft.additional_discount_percentage,
            additional_discount_amount: draft.additional_discount_amount,
            ..Header::new(
                DocumentType::Order,
                draft.subscription_id,
                &draft.customer,
                &draft.currency,
                draft.period,
                draft.transaction_date,
                draft.grand_total,
            )
        };
        self.insert_document(header, &draft.lines).await
    }

    async fn create_invoice(&self, draft: &InvoiceDraft) -> AppResult<DocumentRef> {
        let header = Header {
            secondary_date: Some(draft.due_date),
            additional_discount_percentage: draft.additional_discount_percentage,
            additional_discount_amount: draft.additional_discount_amount,
            reference_type: draft.source_order.as_ref().map(|_| DocumentType::Order),
            reference_doc: draft.source_order.as_ref(),
            ..Header::new(
                DocumentType::Invoice,
                draft.subscription_id,
                &draft.customer,
                &draft.currency,
                draft.period,
                draft.posting_date,
                draft.grand_total,
            )
        };
        self.insert_document(header, &draft.lines).await
    }

    async fn create_payment(&self, draft: &PaymentDraft) -> AppResult<DocumentRef> {
        let header = Header {
            reference_type: Some(draft.reference_type),
            reference_doc: Some(&draft.reference),
            channel: Some(draft.channel),
            paid_to_account: draft.paid_to_account.as_deref(),
            transaction_ref: draft.transaction_ref.as_deref(),
            ..Header::new(
                DocumentType::Payment,
                draft.subscription_id,
                &draft.customer,
                &draft.currency,
                draft.period,
                draft.posting_date,
                draft.amount,
            )
        };
        self.insert_document(header, &[]).await
    }

    async fn create_collection_request(
        &self,
        draft: &CollectionRequestDraft,
    ) -> AppResult<DocumentRef> {
        let header = Header {
            reference_type: Some(draft.reference_type),
            reference_doc: Some(&draft.reference),
            channel: Some(draft.channel),
            ..Header::new(
                DocumentType::PaymentRequest,
                draft.subscription_id,
                &draft.customer,
                &draft.currency,
                draft.period,
                draft.request_date,
                draft.amount,
            )
        };
        self.insert_document(header, &[]).await
    }

    async fn get_order(&self, reference: &DocumentRef) -> AppResult<Option<OrderDraft>> {
        let row = sqlx::query(
            r#"
            SELECT id, subscription_id, customer, currency, period_start, period_end,
                   posting_date, secondary_date, grand_total,
                   additional_discount_percentage, additional_discount_amount
            FROM documents
            WHERE reference = $1 AND document_type = $2 AND NOT cancelled
            "#,
        )
        .bind(reference.as_str())
        .bind(DocumentType::Order.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let posting_date: NaiveDate = row.get("posting_date");
        Ok(Some(OrderDraft {
            subscription_id: row.get("subscription_id"),
            customer: row.get("customer"),
            currency: row.get("currency"),
            period: BillingPeriod::new(row.get("period_start"), row.get("period_end"))?,
            transaction_date: posting_date,
            delivery_date: row
                .get::<Option<NaiveDate>, _>("secondary_date")
                .unwrap_or(posting_date),
            lines: self.document_lines(row.get("id")).await?,
            additional_discount_percentage: row.get("additional_discount_percentage"),
            additional_discount_amount: row.get("additional_discount_amount"),
            grand_total: row.get("grand_total"),
        }))
    }

    async fn document_outstanding(
        &self,
        document_type: DocumentType,
        reference: &DocumentRef,
    ) -> AppResult<Money> {
        if document_type.is_collection() {
            return Err(AppError::InvalidInput(format!(
                "{} has no outstanding amount",
                document_type
            )));
        }

        let outstanding: Option<Money> = sqlx::query_scalar(
            r#"
            SELECT GREATEST(d.grand_total - COALESCE((
                SELECT SUM(p.grand_total) FROM documents p
                WHERE p.document_type = 'payment' AND NOT p.cancelled
                  AND p.reference_doc = d.reference
            ), 0), 0)
            FROM documents d
            WHERE d.reference = $1 AND d.document_type = $2 AND NOT d.cancelled
            "#,
        )
        .bind(reference.as_str())
        .bind(document_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        outstanding.ok_or(AppError::NotFound)
    }

    async fn outstanding_amount(&self, subscription_id: Uuid) -> AppResult<Money> {
        let outstanding: Option<Money> = sqlx::query_scalar(
            r#"
            SELECT SUM(GREATEST(i.grand_total - COALESCE((
                SELECT SUM(p.grand_total) FROM documents p
                WHERE p.document_type = 'payment' AND NOT p.cancelled
                  AND (p.reference_doc = i.reference OR p.reference_doc = i.reference_doc)
            ), 0), 0))
            FROM documents i
            WHERE i.subscription_id = $1 AND i.document_type = 'invoice' AND NOT i.cancelled
            "#,
        )
        .bind(subscription_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(outstanding.unwrap_or(Decimal::ZERO))
    }
}
