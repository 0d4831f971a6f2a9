// Startup configuration.
// Everything comes from the process environment and is loaded once in `main`;
// each client gets the section it needs.

use crate::retry::RetryConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Flat view of the environment. `AMADEUS_API_KEY` maps to `amadeus_api_key`,
/// `RETRY__MAX_ATTEMPTS` to `retry.max_attempts`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub amadeus_api_key: String,
    pub amadeus_api_secret: String,
    #[serde(default = "default_amadeus_base_url")]
    pub amadeus_base_url: String,

    pub sheety_endpoint: String,
    pub sheety_token: String,
    #[serde(default = "default_sheety_collection")]
    pub sheety_collection: String,
    #[serde(default = "default_sheety_record")]
    pub sheety_record: String,

    pub pushover_api_key: String,
    pub pushover_user_key: String,
    #[serde(default = "default_pushover_url")]
    pub pushover_url: String,

    #[serde(default = "default_origin_airport")]
    pub origin_airport: String,
    #[serde(default = "default_origin_city")]
    pub origin_city: String,
    #[serde(default = "default_window_start_days")]
    pub window_start_days: i64,
    #[serde(default = "default_window_length_days")]
    pub window_length_days: i64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_amadeus_base_url() -> String {
    "https://test.api.amadeus.com".to_string()
}
fn default_sheety_collection() -> String {
    "prices".to_string()
}
fn default_sheety_record() -> String {
    "price".to_string()
}
fn default_pushover_url() -> String {
    "https://api.pushover.net/1/messages.json".to_string()
}
fn default_origin_airport() -> String {
    "ORD".to_string()
}
fn default_origin_city() -> String {
    "Chicago".to_string()
}
fn default_window_start_days() -> i64 {
    1
}
fn default_window_length_days() -> i64 {
    180
}

#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub struct SheetyConfig {
    pub endpoint: String,
    pub token: String,
    pub collection: String,
    pub record: String,
}

#[derive(Debug, Clone)]
pub struct PushoverConfig {
    pub url: String,
    pub token: String,
    pub user: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub origin_airport: String,
    pub origin_city: String,
    pub window_start_days: i64,
    pub window_length_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(config::Environment::default())
    }

    /// Load from an environment source; tests pass one with an explicit map.
    pub fn load(source: config::Environment) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(source.separator("__"))
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("AMADEUS_API_KEY", &self.amadeus_api_key),
            ("AMADEUS_API_SECRET", &self.amadeus_api_secret),
            ("SHEETY_ENDPOINT", &self.sheety_endpoint),
            ("SHEETY_TOKEN", &self.sheety_token),
            ("PUSHOVER_API_KEY", &self.pushover_api_key),
            ("PUSHOVER_USER_KEY", &self.pushover_user_key),
            ("ORIGIN_AIRPORT", &self.origin_airport),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{name} must not be empty")));
        }
        if self.window_start_days < 0 {
            return Err(ConfigError::Invalid(
                "WINDOW_START_DAYS must not be negative".to_string(),
            ));
        }
        if self.window_length_days <= 0 {
            return Err(ConfigError::Invalid(
                "WINDOW_LENGTH_DAYS must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "RETRY__MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn amadeus(&self) -> AmadeusConfig {
        AmadeusConfig {
            base_url: self.amadeus_base_url.trim_end_matches('/').to_string(),
            api_key: self.amadeus_api_key.clone(),
            api_secret: self.amadeus_api_secret.clone(),
            retry: self.retry.clone(),
        }
    }

    pub fn sheety(&self) -> SheetyConfig {
        SheetyConfig {
            endpoint: self.sheety_endpoint.trim_end_matches('/').to_string(),
            token: self.sheety_token.clone(),
            collection: self.sheety_collection.clone(),
            record: self.sheety_record.clone(),
        }
    }

    pub fn pushover(&self) -> PushoverConfig {
        PushoverConfig {
            url: self.pushover_url.clone(),
            token: self.pushover_api_key.clone(),
            user: self.pushover_user_key.clone(),
        }
    }

    pub fn search(&self) -> SearchConfig {
        SearchConfig {
            origin_airport: self.origin_airport.clone(),
            origin_city: self.origin_city.clone(),
            window_start_days: self.window_start_days,
            window_length_days: self.window_length_days,
        }
    }
}
