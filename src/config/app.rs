//! Application settings loaded from config.toml
//!
//! Every field has a default, so the bot starts with no config file at all. The
//! price list given here seeds the ledger on first run; later edits in the ledger
//! win over the file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "TRADE_BUDDY_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where uploaded item images are stored
    pub image_dir: PathBuf,
    /// Contact-card image posted to a venue when a trade starts
    pub contact_card: PathBuf,
    /// Initial price list text
    pub price_list: Option<String>,
    /// Accounts whose messages may carry payment notifications. Payment
    /// payloads from anyone else are treated as ordinary text.
    pub payment_notifiers: Vec<u64>,
}

impl AppConfig {
    /// Whether `account_id` is trusted to report payments.
    #[must_use]
    pub fn is_payment_notifier(&self, account_id: u64) -> bool {
        self.payment_notifiers.contains(&account_id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("data/images"),
            contact_card: PathBuf::from("data/contact_card.jpg"),
            price_list: None,
            payment_notifiers: Vec::new(),
        }
    }
}

/// Loads the configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.as_ref().display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the configuration from `TRADE_BUDDY_CONFIG` or `./config.toml`,
/// falling back to defaults when the file does not exist.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        tracing::warn!("Config file {path} not found, using defaults");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_app_config() {
        let toml_str = r#"
            image_dir = "/srv/trade/images"
            contact_card = "/srv/trade/card.jpg"
            price_list = "周赛：10元/场"
            payment_notifiers = [1234567890]
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.image_dir, PathBuf::from("/srv/trade/images"));
        assert_eq!(config.contact_card, PathBuf::from("/srv/trade/card.jpg"));
        assert_eq!(config.price_list.as_deref(), Some("周赛：10元/场"));
        assert!(config.is_payment_notifier(1_234_567_890));
        assert!(!config.is_payment_notifier(42));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.image_dir, PathBuf::from("data/images"));
        assert!(config.price_list.is_none());
        assert!(config.payment_notifiers.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "image_dir = [").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
