//! Configuration types for listing, operations and watching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// Configuration for copy/move/delete invocations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct OperationConfig {
    /// Overwrite existing destination items ("always") instead of failing
    /// them ("never"). Decided once per invocation.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Maximum number of top-level items processed concurrently.
    #[builder(default = "default_concurrency()")]
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Copy the source modification time onto copied files.
    #[builder(default = "false")]
    #[serde(default)]
    pub preserve_timestamps: bool,

    /// Send deleted items to the platform trash instead of removing them.
    #[builder(default = "false")]
    #[serde(default)]
    pub use_trash: bool,
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

impl OperationConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == Some(0) {
            return Err("max_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

impl OperationConfig {
    /// Create a new operation config builder.
    pub fn builder() -> OperationConfigBuilder {
        OperationConfigBuilder::default()
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            overwrite: true,
            max_concurrency: default_concurrency(),
            preserve_timestamps: false,
            use_trash: false,
        }
    }
}

/// Configuration for directory listings.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct ListConfig {
    /// Include dot-prefixed entries.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub show_hidden: bool,

    /// Inject a ".." entry first when the directory has a parent.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_parent: bool,
}

impl ListConfig {
    /// Create a new list config builder.
    pub fn builder() -> ListConfigBuilder {
        ListConfigBuilder::default()
    }

    /// Check if an entry name should be skipped.
    pub fn should_skip(&self, name: &str) -> bool {
        !self.show_hidden && name.starts_with('.')
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            show_hidden: true,
            include_parent: true,
        }
    }
}

/// Configuration for the directory watch service.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WatchConfig {
    /// Window in which raw events are collapsed into one notification.
    #[builder(default = "200")]
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Capacity of the notification broadcast channel.
    #[builder(default = "64")]
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_channel_capacity() -> usize {
    64
}

impl WatchConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.channel_capacity == Some(0) {
            return Err("channel_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

impl WatchConfig {
    /// Create a new watch config builder.
    pub fn builder() -> WatchConfigBuilder {
        WatchConfigBuilder::default()
    }

    /// The debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Complete application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArborConfig {
    #[serde(default)]
    pub operations: OperationConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl ArborConfig {
    /// Default location of the config file (`<config dir>/arbor/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("arbor").join("config.toml"))
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, FsError> {
        let config: Self = toml::from_str(text).map_err(|e| FsError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, FsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(FsError::io(path, e)),
        }
    }

    fn validate(&self) -> Result<(), FsError> {
        if self.operations.max_concurrency == 0 {
            return Err(FsError::InvalidConfig {
                message: "operations.max_concurrency must be at least 1".to_string(),
            });
        }
        if self.watch.channel_capacity == 0 {
            return Err(FsError::InvalidConfig {
                message: "watch.channel_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
