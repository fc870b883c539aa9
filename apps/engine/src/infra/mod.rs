use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod billing_worker;
pub mod clock;
pub mod config;
pub mod db;
pub mod direct_debit_channel;
pub mod dummy_payment_channel;
pub mod error;
pub mod manual_payment_channel;
pub mod setup;

pub async fn postgres_persistence(
    database_url: &str,
    max_connections: u32,
) -> Result<PostgresPersistence, error::InfraError> {
    let pool = init_db(database_url, max_connections).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
