//! Adapter configuration.
//!
//! Raw configuration is deserialized from YAML and validated into a
//! [`ValidatedConfig`] before any adapter exists. Invalid configuration is a
//! construction-time error, not a runtime flag checked on every call; hosts
//! that prefer the classic degrade-to-no-op behavior go through
//! [`crate::PersistenceHandle::from_config`] instead.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::resolver::CollectionLayout;

/// Raw persistence configuration, as loaded from file or host config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Database endpoint (connection URI or storage directory). Required.
    pub endpoint: String,

    /// Database name. Required.
    pub database: String,

    /// Shared collection name. Present selects the shared layout; absent
    /// (or blank) partitions records into one collection per source.
    #[serde(default)]
    pub collection: Option<String>,
}

impl AdapterConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Validate into the configuration the adapter is constructed from.
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` if a required field is blank or the
    /// shared collection name is not a plain identifier.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "the database endpoint is missing - configure the endpoint parameter".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Validation(
                "the database name is missing - configure the database parameter".to_string(),
            ));
        }

        let layout = match self.collection.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(ConfigError::Validation(format!(
                        "collection name {name:?} must contain only letters, digits and underscores"
                    )));
                }
                CollectionLayout::Shared(name.to_string())
            }
            _ => CollectionLayout::PerSource,
        };

        Ok(ValidatedConfig {
            endpoint: self.endpoint.trim().to_string(),
            database: self.database.trim().to_string(),
            layout,
        })
    }
}

/// Configuration that passed validation; precondition for constructing a
/// [`crate::PersistenceAdapter`].
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub endpoint: String,
    pub database: String,
    pub layout: CollectionLayout,
}
