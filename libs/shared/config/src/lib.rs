use std::env;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_API_URL: &str = "https://tabib.zeabur.app";

/// What the slot picker does when the booked-times lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityFallback {
    /// Booking is disabled until a lookup succeeds.
    FailClosed,
    /// Every slot is offered, flagged as unverified.
    AssumeOpen,
}

impl FromStr for AvailabilityFallback {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail_closed" | "closed" => Ok(AvailabilityFallback::FailClosed),
            "assume_open" | "open" => Ok(AvailabilityFallback::AssumeOpen),
            other => Err(format!("unknown availability fallback: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub payments_base_url: String,
    pub request_timeout_secs: u64,
    pub booking_session_ttl_minutes: i64,
    pub currency: String,
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub slot_minutes: u32,
    pub availability_fallback: AvailabilityFallback,
    pub redis_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            payments_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 20,
            booking_session_ttl_minutes: 30,
            currency: "MAD".to_string(),
            workday_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            workday_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_minutes: 30,
            availability_fallback: AvailabilityFallback::FailClosed,
            redis_url: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_base_url = env::var("TABIB_API_URL").unwrap_or_else(|_| {
            warn!("TABIB_API_URL not set, using default");
            defaults.api_base_url.clone()
        });

        let payments_base_url = env::var("TABIB_PAYMENTS_URL").unwrap_or_else(|_| {
            warn!("TABIB_PAYMENTS_URL not set, using API base URL");
            api_base_url.clone()
        });

        let config = Self {
            api_base_url,
            payments_base_url,
            request_timeout_secs: parse_var("BOOKING_REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            booking_session_ttl_minutes: parse_var(
                "BOOKING_SESSION_TTL_MINUTES",
                defaults.booking_session_ttl_minutes,
            ),
            currency: env::var("BOOKING_CURRENCY").unwrap_or(defaults.currency),
            workday_start: parse_time_var("BOOKING_WORKDAY_START", defaults.workday_start),
            workday_end: parse_time_var("BOOKING_WORKDAY_END", defaults.workday_end),
            slot_minutes: parse_var("BOOKING_SLOT_MINUTES", defaults.slot_minutes),
            availability_fallback: parse_var(
                "BOOKING_AVAILABILITY_FALLBACK",
                defaults.availability_fallback,
            ),
            redis_url: env::var("REDIS_URL").ok(),
        };

        if !config.is_configured() {
            warn!("Booking configuration is inconsistent - check workday and slot settings");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty()
            && self.slot_minutes > 0
            && self.workday_start < self.workday_end
            && self.booking_session_ttl_minutes > 0
    }

    pub fn is_redis_configured(&self) -> bool {
        self.redis_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

fn parse_var<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn parse_time_var(key: &str, default: NaiveTime) -> NaiveTime {
    match env::var(key) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").unwrap_or_else(|_| {
            warn!("{} must be formatted HH:MM, got '{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_configured() {
        let config = AppConfig::default();
        assert!(config.is_configured());
        assert!(!config.is_redis_configured());
        assert_eq!(config.currency, "MAD");
        assert_eq!(config.slot_minutes, 30);
    }

    #[test]
    fn test_inverted_workday_is_not_configured() {
        let config = AppConfig {
            workday_start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            ..AppConfig::default()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_availability_fallback_parsing() {
        assert_eq!("fail_closed".parse::<AvailabilityFallback>(), Ok(AvailabilityFallback::FailClosed));
        assert_eq!("ASSUME_OPEN".parse::<AvailabilityFallback>(), Ok(AvailabilityFallback::AssumeOpen));
        assert!("sometimes".parse::<AvailabilityFallback>().is_err());
    }
}
