// ⚙️ Configuration - JSON file + environment overrides
// Every field has a default, so an empty file (or none at all) is valid

use crate::transfer::TransferLimits;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "REMIT_CONFIG";
pub const API_URL_ENV: &str = "REMIT_API_URL";
pub const DB_PATH_ENV: &str = "REMIT_DB_PATH";
pub const TOKEN_ENV: &str = "REMIT_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub database_path: PathBuf,
    pub log_path: PathBuf,
    pub request_timeout_secs: u64,
    pub rate_refresh_secs: u64,
    pub notification_check_secs: u64,
    pub notification_probability: f64,
    pub max_pin_attempts: u32,
    pub lockout_back_delay_ms: u64,
    pub transfer: TransferLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base_url: "http://127.0.0.1:8787".to_string(),
            api_token: None,
            database_path: PathBuf::from("secure-remit.db"),
            log_path: PathBuf::from("secure-remit.log"),
            request_timeout_secs: 15,
            rate_refresh_secs: 30,
            notification_check_secs: 30,
            notification_probability: 0.05,
            max_pin_attempts: 3,
            lockout_back_delay_ms: 2000,
            transfer: TransferLimits::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse config JSON")
    }

    /// File named by REMIT_CONFIG (if set), then env overrides
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.rate_refresh_secs.max(1))
    }

    pub fn notification_check_interval(&self) -> Duration {
        Duration::from_secs(self.notification_check_secs.max(1))
    }

    pub fn lockout_back_delay(&self) -> Duration {
        Duration::from_millis(self.lockout_back_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.max_pin_attempts, 3);
        assert_eq!(config.rate_refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.transfer.max_amount, 100_000.0);
        assert_eq!(config.transfer.fee_rate, 0.02);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "api_base_url": "https://api.example.com", "transfer": { "fee_rate": 0.015 } }"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.transfer.fee_rate, 0.015);
        assert_eq!(config.transfer.max_amount, 100_000.0);
        assert_eq!(config.transfer.input_currency, "USD");
        assert_eq!(config.notification_check_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(|key| match key {
            API_URL_ENV => Some("http://backend:9000".to_string()),
            DB_PATH_ENV => Some("".to_string()),
            TOKEN_ENV => Some("abc".to_string()),
            _ => None,
        });

        assert_eq!(config.api_base_url, "http://backend:9000");
        assert_eq!(config.database_path, PathBuf::from("secure-remit.db"));
        assert_eq!(config.api_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(AppConfig::from_json("{ nope").is_err());
    }
}
