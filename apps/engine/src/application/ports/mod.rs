pub mod clock;
pub mod customer_notifier;
pub mod document_store;
pub mod ledger;
pub mod payment_channel;
pub mod pricing;
