use std::path::Path;

use serde::Deserialize;
use tracing::debug;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `ENGAGEMENT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_site_id")]
    pub site_id: String,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// Granularity selector used when the caller does not pass one.
    #[serde(default = "default_mode")]
    pub default_mode: String,
    #[serde(default)]
    pub cohort_basis: CohortBasis,
    #[serde(default = "default_unknown_country_label")]
    pub unknown_country_label: String,
    #[serde(default = "default_no_data_label")]
    pub no_data_label: String,
}

/// Which users make up a period's cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortBasis {
    /// Every user with at least one session in the period.
    #[default]
    Active,
    /// Only users whose first recorded session falls in the period.
    FirstSeen,
}

fn default_site_id() -> String {
    "default".to_string()
}
fn default_mode() -> String {
    "last7days".to_string()
}
fn default_unknown_country_label() -> String {
    "Unknown".to_string()
}
fn default_no_data_label() -> String {
    "No Data".to_string()
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            cohort_basis: CohortBasis::default(),
            unknown_country_label: default_unknown_country_label(),
            no_data_label: default_no_data_label(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file, then environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("ENGAGEMENT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let loaded: Self = config.try_deserialize()?;
        debug!(
            file = ?file,
            site_id = %loaded.site_id,
            default_mode = %loaded.reporting.default_mode,
            "Configuration loaded"
        );
        Ok(loaded)
    }
}
