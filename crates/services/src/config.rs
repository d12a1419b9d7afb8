use std::env;
use std::str::FromStr;
use std::time::Duration;

use qcm_core::model::PaymentSettings;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://qcm.sqlite3?mode=rwc";

/// Runtime configuration read from `QCM_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub payment: PaymentSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.into(),
            payment: PaymentSettings::default(),
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source. Unset or blank values
    /// keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = lookup("QCM_DB_URL") {
            config.db_url = url.trim().to_owned();
        }
        if let Some(raw) = lookup("QCM_PAYMENT_DELAY_MS") {
            let ms: u64 = parse_var("QCM_PAYMENT_DELAY_MS", &raw)?;
            config.payment.verification_delay = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("QCM_ACCESS_YEARS") {
            config.payment.access_years = parse_var("QCM_ACCESS_YEARS", &raw)?;
        }
        if let Some(raw) = lookup("QCM_MIN_TX_LEN") {
            config.payment.min_transaction_id_len = parse_var("QCM_MIN_TX_LEN", &raw)?;
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        raw: raw.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.payment.verification_delay, Duration::from_millis(2_500));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("QCM_DB_URL", "sqlite::memory:"),
            ("QCM_PAYMENT_DELAY_MS", "10"),
            ("QCM_ACCESS_YEARS", " 2 "),
            ("QCM_MIN_TX_LEN", "8"),
        ]))
        .unwrap();
        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.payment.verification_delay, Duration::from_millis(10));
        assert_eq!(config.payment.access_years, 2);
        assert_eq!(config.payment.min_transaction_id_len, 8);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("QCM_DB_URL", "  ")])).unwrap();
        assert_eq!(config.db_url, DEFAULT_DB_URL);
    }

    #[test]
    fn unparsable_number_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[("QCM_ACCESS_YEARS", "one")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { var: "QCM_ACCESS_YEARS", ref raw } if raw == "one"
        ));
    }
}
