//! Environment-driven configuration
//!
//! Read once at startup, after `dotenvy::dotenv()`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::backfill::BackfillConfig;
use crate::services::entsoe::transport::DEFAULT_BASE_URL;
use crate::services::entsoe::{DataTarget, Endpoint, RequestValidationError, RetryPolicy, TransportConfig};

const DEFAULT_COLLECTION_INTERVAL_SECS: u64 = 900;
const DEFAULT_GAP_ANALYSIS_INTERVAL_SECS: u64 = 86400;
const DEFAULT_GAP_ANALYSIS_LOOKBACK_DAYS: i64 = 30;
const DEFAULT_COLLECTION_AREAS: &str = "CZ";
const DEFAULT_COLLECTION_ENDPOINTS: [Endpoint; 3] = [
    Endpoint::ActualLoad,
    Endpoint::DayAheadLoadForecast,
    Endpoint::DayAheadPrices,
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key}: invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid collection target: {0}")]
    Target(#[from] RequestValidationError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub transport: TransportConfig,
    pub backfill: BackfillConfig,
    /// Entries like `CZ` or `CZ->SK` (flows)
    pub collection_areas: Vec<String>,
    pub collection_endpoints: Vec<Endpoint>,
    pub collection_interval: Duration,
    pub gap_analysis_interval: Duration,
    pub gap_analysis_lookback_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "ENTSOE_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay: Duration::from_millis(parse_or(
                &lookup,
                "ENTSOE_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse_or(
                &lookup,
                "ENTSOE_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )?),
            multiplier: parse_or(&lookup, "ENTSOE_BACKOFF_MULTIPLIER", defaults.multiplier)?,
            retryable_statuses: defaults.retryable_statuses,
        };

        if retry.max_attempts == 0 {
            return Err(invalid("ENTSOE_MAX_ATTEMPTS", "0", "at least one attempt is required"));
        }
        if retry.multiplier < 1.0 {
            return Err(invalid(
                "ENTSOE_BACKOFF_MULTIPLIER",
                &retry.multiplier.to_string(),
                "must be >= 1.0",
            ));
        }

        let mut transport = TransportConfig::new(required("ENTSOE_API_TOKEN")?);
        transport.base_url = lookup("ENTSOE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        transport.connect_timeout =
            Duration::from_secs(parse_or(&lookup, "ENTSOE_CONNECT_TIMEOUT_SECS", 10)?);
        transport.request_timeout =
            Duration::from_secs(parse_or(&lookup, "ENTSOE_REQUEST_TIMEOUT_SECS", 60)?);
        transport.retry = retry;

        let chunk_days = match lookup("BACKFILL_CHUNK_DAYS") {
            Some(raw) => {
                let days: i64 = parse_value("BACKFILL_CHUNK_DAYS", &raw)?;
                if !(1..=365).contains(&days) {
                    return Err(invalid("BACKFILL_CHUNK_DAYS", &raw, "must be between 1 and 365"));
                }
                Some(days)
            }
            None => None,
        };

        let backfill = BackfillConfig {
            rate_limit_delay_ms: parse_or(
                &lookup,
                "BACKFILL_RATE_LIMIT_DELAY_MS",
                BackfillConfig::default().rate_limit_delay_ms,
            )?,
            chunk_days,
        };

        let collection_areas: Vec<String> = lookup("COLLECTION_AREAS")
            .unwrap_or_else(|| DEFAULT_COLLECTION_AREAS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let collection_endpoints = match lookup("COLLECTION_ENDPOINTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Endpoint>())
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_COLLECTION_ENDPOINTS.to_vec(),
        };

        let config = Self {
            database_url: required("DATABASE_URL")?,
            transport,
            backfill,
            collection_areas,
            collection_endpoints,
            collection_interval: Duration::from_secs(parse_or(
                &lookup,
                "COLLECTION_INTERVAL_SECS",
                DEFAULT_COLLECTION_INTERVAL_SECS,
            )?),
            gap_analysis_interval: Duration::from_secs(parse_or(
                &lookup,
                "GAP_ANALYSIS_INTERVAL_SECS",
                DEFAULT_GAP_ANALYSIS_INTERVAL_SECS,
            )?),
            gap_analysis_lookback_days: parse_or(
                &lookup,
                "GAP_ANALYSIS_LOOKBACK_DAYS",
                DEFAULT_GAP_ANALYSIS_LOOKBACK_DAYS,
            )?,
        };

        // Fail at startup rather than on the first tick
        config.collection_targets()?;
        Ok(config)
    }

    /// Every configured (endpoint, area) pair
    ///
    /// Plain areas get each configured endpoint except physical flows;
    /// `FROM->TO` entries only get physical flows.
    pub fn collection_targets(&self) -> Result<Vec<DataTarget>, RequestValidationError> {
        let mut targets = Vec::new();

        for area in &self.collection_areas {
            if area.contains("->") {
                targets.push(DataTarget::new(Endpoint::PhysicalFlows, area)?);
                continue;
            }
            for endpoint in &self.collection_endpoints {
                if *endpoint != Endpoint::PhysicalFlows {
                    targets.push(DataTarget::new(*endpoint, area)?);
                }
            }
        }

        Ok(targets)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/entsoe"),
        ("ENTSOE_API_TOKEN", "secret-token"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.transport.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.transport.retry, RetryPolicy::default());
        assert_eq!(config.backfill.rate_limit_delay_ms, 1000);
        assert_eq!(config.backfill.chunk_days, None);
        assert_eq!(config.collection_interval, Duration::from_secs(900));
        assert_eq!(config.gap_analysis_lookback_days, 30);

        let targets = config.collection_targets().unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|t| t.area_key() == "CZ"));
    }

    #[test]
    fn test_missing_token() {
        let err = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ENTSOE_API_TOKEN")));
    }

    #[test]
    fn test_overrides_and_flow_targets() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("ENTSOE_MAX_ATTEMPTS", "5"),
            ("ENTSOE_BASE_DELAY_MS", "250"),
            ("BACKFILL_CHUNK_DAYS", "7"),
            ("COLLECTION_AREAS", "CZ, SK ,CZ->SK"),
            ("COLLECTION_ENDPOINTS", "actual_load"),
        ]);

        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.transport.retry.max_attempts, 5);
        assert_eq!(config.transport.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.backfill.chunk_days, Some(7));

        let keys: Vec<String> = config
            .collection_targets()
            .unwrap()
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(keys, vec!["actual_load/CZ", "actual_load/SK", "physical_flows/CZ->SK"]);
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BACKFILL_CHUNK_DAYS", "400"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "BACKFILL_CHUNK_DAYS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ENTSOE_MAX_ATTEMPTS", "many"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "ENTSOE_MAX_ATTEMPTS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("COLLECTION_AREAS", "XX"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Target(_))
        ));
    }
}
