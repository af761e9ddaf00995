// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::fmt;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Log verbosity, lowest to highest
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

// ============================================
// Rewrite rule configuration
// ============================================

/// Extension appended to alias paths when no override applies
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FallbackExtension {
    Webp,
    Png,
}

impl FallbackExtension {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for FallbackExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Degradation switch, named after the content it serves
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DegradationMode {
    /// Lightweight `.webp` variants
    #[default]
    Optimized,
    /// Heavyweight `.png` variants
    Degraded,
}

/// A literal alias path served with a fixed extension
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PathOverride {
    pub path: String,
    pub extension: String,
}

/// Rewrite rule configuration
///
/// An empty `special_path_overrides` list gives the plain single-rule
/// behavior; the default carries the `/main-layout` page overlay.
#[derive(Debug, Deserialize, Clone)]
pub struct RewriteConfig {
    #[serde(default)]
    pub mode: DegradationMode,
    /// Takes precedence over `mode` when set
    #[serde(default)]
    pub fallback_extension: Option<FallbackExtension>,
    /// Suffixes that are served as-is (matched case-insensitively)
    #[serde(default = "default_passthrough_extensions")]
    pub passthrough_extensions: Vec<String>,
    #[serde(default = "default_special_path_overrides")]
    pub special_path_overrides: Vec<PathOverride>,
}

impl RewriteConfig {
    /// Resolve the degradation switch to a concrete extension
    pub const fn effective_fallback(&self) -> FallbackExtension {
        match self.fallback_extension {
            Some(ext) => ext,
            None => match self.mode {
                DegradationMode::Optimized => FallbackExtension::Webp,
                DegradationMode::Degraded => FallbackExtension::Png,
            },
        }
    }
}

fn default_passthrough_extensions() -> Vec<String> {
    [
        "css", "js", "json", "png", "jpg", "jpeg", "webp", "gif", "svg", "ico", "txt", "html",
        "map",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_special_path_overrides() -> Vec<PathOverride> {
    vec![PathOverride {
        path: "/main-layout".to_string(),
        extension: "html".to_string(),
    }]
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            mode: DegradationMode::default(),
            fallback_extension: None,
            passthrough_extensions: default_passthrough_extensions(),
            special_path_overrides: default_special_path_overrides(),
        }
    }
}

// ============================================
// Asset store configuration
// ============================================

/// Backend the rewriter delegates lookups to
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Files below a local directory
    Directory { root: String },
    /// An upstream HTTP origin
    Origin {
        url: String,
        /// Forward the client's `Host` header instead of the origin authority
        #[serde(default)]
        preserve_host: bool,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Directory {
            root: "public".to_string(),
        }
    }
}
