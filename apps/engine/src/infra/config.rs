use std::str::FromStr;

use env_helpers::{get_env, get_env_default};

use crate::{
    application::use_cases::{
        billing_cycle::ProcessOptions, payment_channel_factory::PaymentChannelSettings,
    },
    domain::entities::{payment_channel::PaymentChannelKind, payment_scenario::PaymentScenario},
    infra::error::InfraError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    /// Seconds between billing runs
    pub tick_secs: u64,
    /// Subscriptions processed in parallel within one run
    pub max_concurrent: usize,
    /// Page size when listing processable subscriptions
    pub batch_size: i64,
    pub mute_payment_channels: bool,
    pub mute_notifications: bool,
    /// Price list assigned to new subscriptions without one
    pub default_price_list: Option<String>,
    pub payment_channels: PaymentChannelSettings,
    pub log_format: LogFormat,
}

fn parse_var<T: FromStr>(var: &'static str, value: String) -> Result<T, InfraError> {
    value
        .trim()
        .parse()
        .map_err(|_| InfraError::ConfigInvalid { var, value })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url: String = get_env("DATABASE_URL");
        let database_max_connections: u32 = get_env_default("DATABASE_MAX_CONNECTIONS", 5);
        let tick_secs: u64 = get_env_default("BILLING_TICK_SECS", 3600);
        let max_concurrent: usize = get_env_default("BILLING_MAX_CONCURRENT", 8);
        let batch_size: i64 = get_env_default("BILLING_BATCH_SIZE", 500);
        let mute_payment_channels: bool = get_env_default("MUTE_PAYMENT_CHANNELS", false);
        let mute_notifications: bool = get_env_default("MUTE_NOTIFICATIONS", false);
        let default_price_list = std::env::var("DEFAULT_PRICE_LIST")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let default_channel: PaymentChannelKind = parse_var(
            "DEFAULT_PAYMENT_CHANNEL",
            get_env_default("DEFAULT_PAYMENT_CHANNEL", "manual".to_string()),
        )?;
        let dummy_scenario: PaymentScenario = parse_var(
            "DUMMY_PAYMENT_SCENARIO",
            get_env_default("DUMMY_PAYMENT_SCENARIO", "success".to_string()),
        )?;
        let direct_debit_clearing_account: String = get_env_default(
            "DIRECT_DEBIT_ACCOUNT",
            PaymentChannelSettings::default().direct_debit_clearing_account,
        );

        let log_format = match get_env_default("LOG_FORMAT", "pretty".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(InfraError::ConfigInvalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        if batch_size <= 0 {
            return Err(InfraError::ConfigInvalid {
                var: "BILLING_BATCH_SIZE",
                value: batch_size.to_string(),
            });
        }

        Ok(Self {
            database_url,
            database_max_connections,
            tick_secs: tick_secs.max(1),
            max_concurrent: max_concurrent.max(1),
            batch_size,
            mute_payment_channels,
            mute_notifications,
            default_price_list,
            payment_channels: PaymentChannelSettings {
                default_channel,
                direct_debit_clearing_account,
                dummy_scenario,
            },
            log_format,
        })
    }

    /// Options applied to every scheduled run.
    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            mute_notifications: self.mute_notifications,
            mute_payment_channels: self.mute_payment_channels,
            simulate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_accepts_enum_names() {
        let kind: PaymentChannelKind =
            parse_var("DEFAULT_PAYMENT_CHANNEL", "Direct_Debit".into()).unwrap();
        assert_eq!(kind, PaymentChannelKind::DirectDebit);

        let scenario: PaymentScenario =
            parse_var("DUMMY_PAYMENT_SCENARIO", " insufficient_funds ".into()).unwrap();
        assert_eq!(scenario, PaymentScenario::InsufficientFunds);
    }

    #[test]
    fn test_parse_var_reports_variable() {
        let err = parse_var::<PaymentChannelKind>("DEFAULT_PAYMENT_CHANNEL", "paypal".into())
            .unwrap_err();
        assert!(err.to_string().contains("DEFAULT_PAYMENT_CHANNEL"));
    }
}
