//! Registry configuration

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CLIENT_NAME: &str = "HttpClient";

/// Settings for a [`crate::TestHttpClient`] instance.
///
/// ```toml
/// name = "BillingApi"
/// dump_on_verify_failure = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Prefix for error messages and the `client` field of log records
    #[serde(default = "default_client_name")]
    pub name: String,

    /// Log every outstanding request at warn level when verification fails
    #[serde(default)]
    pub dump_on_verify_failure: bool,
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            dump_on_verify_failure: false,
        }
    }
}

impl RegistryConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_dump_on_verify_failure(mut self, enabled: bool) -> Self {
        self.dump_on_verify_failure = enabled;
        self
    }

    /// Parse a configuration from TOML. Missing keys fall back to defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse registry configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid registry config {}", path.display()))
    }
}
