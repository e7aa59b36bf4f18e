//! Configuration module for cloudprov.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::domain::ProviderEndpoint;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for cloudprov.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
    pub discovery: DiscoveryConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
    pub example_provider: ExampleProviderConfig,
}

/// Which message bus to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

impl std::fmt::Display for BusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusKind::Session => write!(f, "session"),
            BusKind::System => write!(f, "system"),
        }
    }
}

/// Message bus settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Bus the providers and the manager live on.
    pub kind: BusKind,
    /// Per-call timeout in milliseconds for `GetName`/`GetStatus`. `0` waits forever.
    pub call_timeout_ms: u64,
}

/// Provider endpoint discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directories scanned for `*.yaml` provider descriptors.
    pub directories: Vec<PathBuf>,
    /// Endpoints that are always present, in addition to descriptor files.
    pub endpoints: Vec<ProviderEndpoint>,
    /// Re-scan the descriptor directories when their contents change.
    pub watch: bool,
}

/// Periodic refresh settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between forced refreshes of every provider. `0` disables the timer;
    /// providers then only update on `CloudProviderChanged` hints.
    pub interval_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Settings for the bundled example provider server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleProviderConfig {
    pub bus_name: String,
    pub object_path: String,
    /// Name answered to `GetName`.
    pub name: String,
    /// Milliseconds between random status changes.
    pub change_interval_ms: u64,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudprov/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudprov")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// System-wide descriptor directory installed by provider packages.
pub const SYSTEM_PROVIDERS_DIR: &str = "/usr/share/cloudprov/providers";

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let user_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("cloudprov")
            .join("providers");
        Self {
            directories: vec![PathBuf::from(SYSTEM_PROVIDERS_DIR), user_dir],
            endpoints: Vec::new(),
            watch: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ExampleProviderConfig {
    fn default() -> Self {
        Self {
            bus_name: "org.gtk.CloudProviderServerExample".to_string(),
            object_path: "/org/gtk/CloudProviderServerExample".to_string(),
            name: "MyCloud".to_string(),
            change_interval_ms: 1000,
        }
    }
}

impl BusConfig {
    /// Per-call timeout, `None` when calls may wait forever.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }
}

impl ExampleProviderConfig {
    /// Endpoint the example server exports, if the configured names are valid.
    pub fn endpoint(&self) -> Result<ProviderEndpoint, crate::domain::DomainError> {
        ProviderEndpoint::new(self.bus_name.clone(), self.object_path.clone())
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"refresh.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- discovery ---
        for (i, dir) in self.discovery.directories.iter().enumerate() {
            // `~` is expanded at runtime
            let dir_str = dir.to_string_lossy();
            if !dir.is_absolute() && !dir_str.starts_with('~') {
                errors.push(ValidationError {
                    field: format!("discovery.directories[{i}]"),
                    message: format!("must be an absolute path: {}", dir.display()),
                });
            }
        }
        for (i, endpoint) in self.discovery.endpoints.iter().enumerate() {
            let duplicate = self.discovery.endpoints[..i].contains(endpoint);
            if duplicate {
                errors.push(ValidationError {
                    field: format!("discovery.endpoints[{i}]"),
                    message: format!("duplicate endpoint {endpoint}"),
                });
            }
        }
        if self.discovery.directories.is_empty() && self.discovery.endpoints.is_empty() {
            errors.push(ValidationError {
                field: "discovery".into(),
                message: "no descriptor directories and no static endpoints configured".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- example_provider ---
        if let Err(e) = self.example_provider.endpoint() {
            errors.push(ValidationError {
                field: "example_provider".into(),
                message: e.to_string(),
            });
        }
        if self.example_provider.name.trim().is_empty() {
            errors.push(ValidationError {
                field: "example_provider.name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.example_provider.change_interval_ms == 0 {
            errors.push(ValidationError {
                field: "example_provider.change_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cloudprov_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .discovery_directories(vec![PathBuf::from("/etc/cloudprov/providers")])
///     .refresh_interval_secs(60)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- bus ---

    pub fn bus_kind(mut self, kind: BusKind) -> Self {
        self.config.bus.kind = kind;
        self
    }

    pub fn bus_call_timeout_ms(mut self, ms: u64) -> Self {
        self.config.bus.call_timeout_ms = ms;
        self
    }

    // --- discovery ---

    pub fn discovery_directories(mut self, directories: Vec<PathBuf>) -> Self {
        self.config.discovery.directories = directories;
        self
    }

    pub fn discovery_endpoint(mut self, endpoint: ProviderEndpoint) -> Self {
        self.config.discovery.endpoints.push(endpoint);
        self
    }

    pub fn discovery_watch(mut self, watch: bool) -> Self {
        self.config.discovery.watch = watch;
        self
    }

    // --- refresh ---

    pub fn refresh_interval_secs(mut self, seconds: u64) -> Self {
        self.config.refresh.interval_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- example_provider ---

    pub fn example_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.example_provider.name = name.into();
        self
    }

    pub fn example_provider_change_interval_ms(mut self, ms: u64) -> Self {
        self.config.example_provider.change_interval_ms = ms;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
