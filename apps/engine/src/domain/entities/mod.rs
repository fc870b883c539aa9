pub mod generated_document;
pub mod lifecycle_event;
pub mod payment_channel;
pub mod payment_scenario;
pub mod plan_line;
pub mod subscription;
