//! Service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration shared by every SWIFT service on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Seconds between alive polls. A node not accessed for longer than
    /// this becomes eligible for polling.
    pub alive_polling_seconds: u64,
    /// Seconds an operation stays valid from its creation time. Prevents
    /// replay of the same operation.
    pub storage_operation_timeout: u64,
    /// Minutes between storage manager rebuilds.
    pub storage_manager_refresh_minutes: u64,
    /// Maximum number of stores one storage manager may aggregate.
    pub max_stores: usize,
    /// Seconds that cookie copies can be relied on to be current. The home
    /// node consults the rest of the network when its copy is older.
    pub home_node_timeout: u64,
    /// Default number of nodes consulted per storage operation.
    pub node_count: u8,
    /// HTTP scheme: `http` for development, `https` for production.
    pub scheme: String,
    /// Enables debug logging, relaxed cookie-corruption reporting and the
    /// node listing endpoints.
    pub debug: bool,
    /// Default page title when the caller provides none.
    pub title: String,
    /// Default page message when the caller provides none.
    pub message: String,
    /// Default page background colour.
    pub background_color: String,
    /// Default message text colour.
    pub message_color: String,
    /// Default progress indicator colour.
    pub progress_color: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            alive_polling_seconds: 60,
            storage_operation_timeout: 60,
            storage_manager_refresh_minutes: 60,
            max_stores: 10,
            home_node_timeout: 86_400,
            node_count: 3,
            scheme: "https".to_owned(),
            debug: false,
            title: "Storage operation".to_owned(),
            message: "Working...".to_owned(),
            background_color: "#f5f5f5".to_owned(),
            message_color: "darkslategray".to_owned(),
            progress_color: "darkgreen".to_owned(),
        }
    }
}

/// A configuration field failed validation.
#[derive(Debug, Error)]
#[error("configuration option '{option}' invalid: {reason}")]
pub struct ConfigError {
    /// The offending option, in its camelCase file spelling.
    pub option: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl Configuration {
    /// Confirms the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(option: &'static str, v: u64) -> Result<(), ConfigError> {
            if v == 0 {
                return Err(ConfigError {
                    option,
                    reason: "a positive value must be supplied".to_owned(),
                });
            }
            Ok(())
        }
        positive("alivePollingSeconds", self.alive_polling_seconds)?;
        positive("storageOperationTimeout", self.storage_operation_timeout)?;
        positive(
            "storageManagerRefreshMinutes",
            self.storage_manager_refresh_minutes,
        )?;
        positive("maxStores", self.max_stores as u64)?;
        positive("homeNodeTimeout", self.home_node_timeout)?;
        positive("nodeCount", u64::from(self.node_count))?;
        if self.scheme != "http" && self.scheme != "https" {
            return Err(ConfigError {
                option: "scheme",
                reason: format!("'{}' must be http or https", self.scheme),
            });
        }
        Ok(())
    }

    /// Operation lifetime as a duration.
    pub fn storage_operation_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_operation_timeout)
    }

    /// Home node cookie freshness window as a duration.
    pub fn home_node_timeout(&self) -> Duration {
        Duration::from_secs(self.home_node_timeout)
    }

    /// Alive polling interval as a duration.
    pub fn alive_polling_interval(&self) -> Duration {
        Duration::from_secs(self.alive_polling_seconds)
    }

    /// Storage manager refresh interval as a duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.storage_manager_refresh_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Configuration::default().validate().unwrap();
    }

    #[test]
    fn zero_interval_rejected() {
        let c = Configuration {
            alive_polling_seconds: 0,
            ..Default::default()
        };
        let err = c.validate().unwrap_err();
        assert_eq!(err.option, "alivePollingSeconds");
    }

    #[test]
    fn bad_scheme_rejected() {
        let c = Configuration {
            scheme: "ftp".to_owned(),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn deserialises_camel_case() {
        let c: Configuration = serde_json::from_str(
            r#"{"alivePollingSeconds": 5, "scheme": "http", "nodeCount": 7}"#,
        )
        .unwrap();
        assert_eq!(c.alive_polling_seconds, 5);
        assert_eq!(c.scheme, "http");
        assert_eq!(c.node_count, 7);
    }
}
