use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::SessionOptions;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceSettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub review: ReviewSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self { page_size: default_page_size() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_export_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_remote_filename")]
    pub remote_filename: String,
    #[serde(default = "default_workbook_filename")]
    pub workbook_filename: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: default_export_directory(),
            remote_filename: default_remote_filename(),
            workbook_filename: default_workbook_filename(),
        }
    }
}

/// Inputs for a non-interactive run of the binary
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Columns to combine; empty means "use the service's recommendation"
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            file: None,
            table_name: default_table_name(),
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_timeout_secs() -> u64 { 30 }
fn default_interval_ms() -> u64 { 1000 }
fn default_page_size() -> usize { 10 }
fn default_export_directory() -> PathBuf { PathBuf::from(".") }
fn default_remote_filename() -> String { "matching_results.xlsx".to_string() }
fn default_workbook_filename() -> String { "review_queue.xlsx".to_string() }
fn default_table_name() -> String { "uploaded".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

fn environment() -> Environment {
    // e.g., MATCH_REVIEW__SERVICE__BASE_URL -> service.base_url
    Environment::with_prefix("MATCH_REVIEW")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("session.columns")
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with MATCH_REVIEW__)
    /// 5. MATCH_SERVICE_URL, if set
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        let settings = apply_service_url(settings)?;
        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms.max(1))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            page_size: self.review.page_size.max(1),
            poll_interval: self.poll_interval(),
            remote_export_filename: self.export.remote_filename.clone(),
        }
    }
}

/// The service URL is commonly injected on its own, outside the prefixed scheme
fn apply_service_url(settings: Config) -> Result<Config, ConfigError> {
    match std::env::var("MATCH_SERVICE_URL") {
        Ok(url) => Config::builder()
            .add_source(settings)
            .set_override("service.base_url", url)?
            .build(),
        Err(_) => Ok(settings),
    }
}
