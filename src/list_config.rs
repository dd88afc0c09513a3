//! # List Configuration Module
//!
//! Runtime settings for the list engine: where documents live, whether
//! expiry dates are suggested, and how moved shopping items are cleaned up.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn};

// Constants for list configuration
pub const DEFAULT_COLLECTION: &str = "list_items";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_PREDICTION_TIMEOUT_SECS: u64 = 10;

/// Configuration for the shopping/inventory list engine
#[derive(Debug, Clone, PartialEq)]
pub struct ListConfig {
    /// Postgres connection string; `None` keeps documents in memory
    pub database_url: Option<String>,
    /// Endpoint of the expiry prediction service; `None` disables suggestions
    pub expiry_endpoint: Option<String>,
    /// Timeout for expiry prediction requests in seconds
    pub prediction_timeout_secs: u64,
    /// Locale for user-facing notices ("en", "fr")
    pub locale: String,
    /// Seed step drafts with a predicted expiry date
    pub suggest_expiries: bool,
    /// Remove checked units from the shopping list after moving them
    pub remove_moved_shopping_items: bool,
    /// Collection holding list item documents
    pub collection: String,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            expiry_endpoint: None,
            prediction_timeout_secs: DEFAULT_PREDICTION_TIMEOUT_SECS,
            locale: DEFAULT_LOCALE.to_string(),
            suggest_expiries: false,
            remove_moved_shopping_items: true,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl ListConfig {
    /// Load from the environment (and a `.env` file if present)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            database_url: optional("DATABASE_URL"),
            expiry_endpoint: optional("EXPIRY_PREDICTION_URL"),
            prediction_timeout_secs: try_load("EXPIRY_PREDICTION_TIMEOUT_SECS", defaults.prediction_timeout_secs),
            locale: optional("LIST_LOCALE").unwrap_or(defaults.locale),
            suggest_expiries: try_load("SUGGEST_EXPIRIES", defaults.suggest_expiries),
            remove_moved_shopping_items: try_load(
                "REMOVE_MOVED_SHOPPING_ITEMS",
                defaults.remove_moved_shopping_items,
            ),
            collection: optional("LIST_COLLECTION").unwrap_or(defaults.collection),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ListConfig::default();
        assert_eq!(config.collection, "list_items");
        assert_eq!(config.locale, "en");
        assert!(config.remove_moved_shopping_items);
        assert!(!config.suggest_expiries);
        assert!(config.prediction_timeout_secs > 0);
    }

    #[test]
    fn test_try_load_falls_back_on_invalid_value() {
        env::set_var("PANTRY_TEST_BOOL", "not-a-bool");
        assert!(try_load("PANTRY_TEST_BOOL", true));

        env::set_var("PANTRY_TEST_BOOL", "false");
        assert!(!try_load("PANTRY_TEST_BOOL", true));
        env::remove_var("PANTRY_TEST_BOOL");

        assert_eq!(try_load("PANTRY_TEST_UNSET_NUMBER", 7u64), 7);
    }
}
