use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the workspace whose history is exported
pub const WORKSPACE_ID_ENV: &str = "RC_WORKSPACE_ID";

/// Environment variable overriding the export directory
pub const OUTPUT_DIR_ENV: &str = "ROBOT_ARTIFACTS";

/// Environment variable pointing at the local secret file
pub const SECRET_FILE_ENV: &str = "RPA_SECRET_FILE";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace selection
    pub workspace: WorkspaceConfig,

    /// Remote API configuration
    pub api: ApiConfig,

    /// Secret store configuration
    pub vault: VaultConfig,

    /// CSV export configuration
    pub export: ExportConfig,

    /// Optional database sink
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Run assembly options
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load(config_path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let config_path = config_path
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| std::env::var("RUN_EXPORT_CONFIG").ok())
            .unwrap_or_else(|| "config/run-export.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: RUN_EXPORT_)
            .add_source(
                config::Environment::with_prefix("RUN_EXPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            // Platform-provided variables win over everything but CLI flags
            .set_override_option("workspace.id", std::env::var(WORKSPACE_ID_ENV).ok())?
            .set_override_option("export.output_dir", std::env::var(OUTPUT_DIR_ENV).ok())?
            .set_override_option("vault.path", std::env::var(SECRET_FILE_ENV).ok())?
            .build()?
            .try_deserialize()
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            return Err(AppError::Configuration(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.api.max_concurrency == 0 {
            return Err(AppError::Configuration(
                "api.max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.api.max_backoff_ms < self.api.retry_backoff_ms {
            return Err(AppError::Configuration(
                "api.max_backoff_ms must not be smaller than api.retry_backoff_ms".to_string(),
            ));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(AppError::Configuration(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }

        if self.export.file_name.trim().is_empty() {
            return Err(AppError::Configuration(
                "export.file_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceConfig {
    /// Workspace identifier; empty means "not configured"
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL up to and excluding `/workspaces/...`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token prefix used in the Authorization header
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Number of processes (and step lookups) fetched concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_scheme: default_auth_scheme(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// JSON secret file
    #[serde(default = "default_vault_path")]
    pub path: PathBuf,

    /// Bundle holding the API key
    #[serde(default = "default_api_secret")]
    pub api_secret: String,

    /// Field of the API bundle holding the key
    #[serde(default = "default_api_key_field")]
    pub api_key_field: String,

    /// Bundle holding database connection parameters
    #[serde(default = "default_database_secret")]
    pub database_secret: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            api_secret: default_api_secret(),
            api_key_field: default_api_key_field(),
            database_secret: default_database_secret(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving the CSV file
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name inside `output_dir`
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

impl ExportConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_name: default_file_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Persist rows after the CSV export
    #[serde(default)]
    pub enabled: bool,

    /// Target table
    #[serde(default = "default_table")]
    pub table: String,

    /// Keep inserting after a row fails instead of aborting the batch
    #[serde(default)]
    pub continue_on_error: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: default_table(),
            continue_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Drop runs whose id was already seen (first occurrence wins)
    #[serde(default)]
    pub dedupe_runs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://cloud.robocorp.com/api/v1".to_string()
}

fn default_auth_scheme() -> String {
    "RC-WSKEY".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_vault_path() -> PathBuf {
    PathBuf::from("vault.json")
}

fn default_api_secret() -> String {
    "get_processes".to_string()
}

fn default_api_key_field() -> String {
    "api".to_string()
}

fn default_database_secret() -> String {
    "db_connect".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_file_name() -> String {
    "combined.csv".to_string()
}

fn default_table() -> String {
    "logs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            api: ApiConfig::default(),
            vault: VaultConfig::default(),
            export: ExportConfig::default(),
            database: DatabaseConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
