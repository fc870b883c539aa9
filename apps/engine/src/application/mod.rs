pub mod app_error;
pub mod billing;
pub mod ports;
pub mod use_cases;
