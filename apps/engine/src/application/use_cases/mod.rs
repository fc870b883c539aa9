pub mod billing_cycle;
pub mod document_generators;
pub mod payment_channel_factory;
pub mod subscription;
