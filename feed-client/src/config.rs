//! Configuration loading for feed-client.
//!
//! Configuration is loaded from a TOML file. Every field has a default, so an
//! empty file (or no file at all, via [`ClientConfig::default`]) is valid.

use feed_core::DEFAULT_BOTTOM_THRESHOLD_PX;
use feed_types::SortOrder;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for feed-client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Discussion feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Comment thread configuration.
    #[serde(default)]
    pub comments: CommentsConfig,
    /// Viewport configuration.
    #[serde(default)]
    pub viewport: ViewportConfig,
}

/// Discussion feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Discussions per page (default: 10).
    #[serde(default = "default_feed_page_size")]
    pub page_size: u32,
}

/// Comment thread configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentsConfig {
    /// Comments per page request (default: 50).
    #[serde(default = "default_comment_page_size")]
    pub page_size: u32,
    /// Pages fetched at most for one full load (default: 20).
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Order requested from the backend (default: asc).
    #[serde(default)]
    pub sort: SortOrder,
    /// Delay before the fallback re-fetch after a local comment (default: 1000).
    #[serde(default = "default_refetch_delay_ms")]
    pub refetch_delay_ms: u64,
}

impl CommentsConfig {
    /// The fallback re-fetch delay.
    pub fn refetch_delay(&self) -> Duration {
        Duration::from_millis(self.refetch_delay_ms)
    }
}

/// Viewport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    /// Distance from the bottom that still counts as "at the bottom" (default: 100).
    #[serde(default = "default_bottom_threshold_px")]
    pub bottom_threshold_px: f64,
}

// Default value functions
fn default_feed_page_size() -> u32 {
    10
}

fn default_comment_page_size() -> u32 {
    50
}

fn default_max_pages() -> u32 {
    20
}

fn default_refetch_delay_ms() -> u64 {
    1000
}

fn default_bottom_threshold_px() -> f64 {
    DEFAULT_BOTTOM_THRESHOLD_PX
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_feed_page_size(),
        }
    }
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            page_size: default_comment_page_size(),
            max_pages: default_max_pages(),
            sort: SortOrder::default(),
            refetch_delay_ms: default_refetch_delay_ms(),
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            bottom_threshold_px: default_bottom_threshold_px(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.page_size == 0 {
            return Err(ConfigError::Invalid("feed.page_size must be > 0".into()));
        }
        if self.comments.page_size == 0 {
            return Err(ConfigError::Invalid("comments.page_size must be > 0".into()));
        }
        if self.comments.max_pages == 0 {
            return Err(ConfigError::Invalid("comments.max_pages must be > 0".into()));
        }
        let threshold = self.viewport.bottom_threshold_px;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "viewport.bottom_threshold_px must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
