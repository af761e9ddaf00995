// Configuration module entry point
// Loads layered configuration and validates it once at startup

mod state;
mod types;

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::error::ConfigError;

// Re-export public types
pub use state::AppState;
pub use types::{Config, LogLevel, RewriteConfig, StoreConfig};
#[cfg(test)]
pub use types::{FallbackExtension, PathOverride};

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Environment variables prefixed with `SERVER_` override file values,
    /// nested keys separated by `__` (e.g. `SERVER_REWRITE__MODE=degraded`).
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SERVER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "asset-alias-proxy/0.1")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.normalize()?;
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|e| ConfigError::Address(addr, e))
    }

    /// Validate values that serde cannot check and canonicalize extensions
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        self.rewrite.normalize()?;
        self.store.validate()
    }
}

impl RewriteConfig {
    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.passthrough_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "rewrite.passthrough_extensions must not be empty".to_string(),
            ));
        }
        for ext in &mut self.passthrough_extensions {
            *ext = normalize_extension(ext, "rewrite.passthrough_extensions")?;
        }

        let mut seen = HashSet::new();
        for entry in &mut self.special_path_overrides {
            if !entry.path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "override path `{}` must start with `/`",
                    entry.path
                )));
            }
            if !seen.insert(entry.path.clone()) {
                return Err(ConfigError::Validation(format!(
                    "override path `{}` is listed more than once",
                    entry.path
                )));
            }
            entry.extension = normalize_extension(&entry.extension, &entry.path)?;
        }
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Directory { root } if root.is_empty() => Err(ConfigError::Validation(
                "store.root must not be empty".to_string(),
            )),
            Self::Directory { .. } => Ok(()),
            Self::Origin { url, .. } => {
                let uri: hyper::Uri = url.parse().map_err(|e| {
                    ConfigError::Validation(format!("store.url `{url}` is not a valid uri: {e}"))
                })?;
                if uri.scheme_str() != Some("http") || uri.authority().is_none() {
                    return Err(ConfigError::Validation(format!(
                        "store.url `{url}` must be an absolute http:// url"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Strip a leading dot and reject empty or dotted extensions
fn normalize_extension(ext: &str, field: &str) -> Result<String, ConfigError> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() || trimmed.contains(['.', '/']) {
        return Err(ConfigError::Validation(format!(
            "invalid extension `{ext}` in {field}"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [logging]
            level = "info"
            access_log = true
            show_headers = false

            [performance]
            keep_alive_timeout = 75
            read_timeout = 30
            write_timeout = 30

            [http]
            server_name = "test"
            max_body_size = 1024
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults_apply_when_sections_missing() {
        let cfg = base_config();
        assert_eq!(cfg.rewrite.effective_fallback(), FallbackExtension::Webp);
        assert_eq!(
            cfg.store,
            StoreConfig::Directory {
                root: "public".to_string()
            }
        );
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_normalize_strips_leading_dot() {
        let mut cfg = base_config();
        cfg.rewrite.passthrough_extensions = vec![".CSS".to_string(), "js".to_string()];
        cfg.rewrite.special_path_overrides[0].extension = ".html".to_string();
        cfg.normalize().unwrap();
        assert_eq!(cfg.rewrite.passthrough_extensions, vec!["CSS", "js"]);
        assert_eq!(cfg.rewrite.special_path_overrides[0].extension, "html");
    }

    #[test]
    fn test_normalize_rejects_relative_override() {
        let mut cfg = base_config();
        cfg.rewrite.special_path_overrides[0].path = "main-layout".to_string();
        assert!(matches!(cfg.normalize(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_normalize_rejects_duplicate_override() {
        let mut cfg = base_config();
        let dup = cfg.rewrite.special_path_overrides[0].clone();
        cfg.rewrite.special_path_overrides.push(dup);
        assert!(matches!(cfg.normalize(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_normalize_rejects_empty_extension_set() {
        let mut cfg = base_config();
        cfg.rewrite.passthrough_extensions.clear();
        assert!(cfg.normalize().is_err());
    }

    #[test]
    fn test_origin_url_must_be_http() {
        let mut cfg = base_config();
        cfg.store = StoreConfig::Origin {
            url: "https://assets.example.com".to_string(),
            preserve_host: false,
        };
        assert!(cfg.normalize().is_err());

        cfg.store = StoreConfig::Origin {
            url: "/relative".to_string(),
            preserve_host: false,
        };
        assert!(cfg.normalize().is_err());

        cfg.store = StoreConfig::Origin {
            url: "http://assets.internal:8081".to_string(),
            preserve_host: true,
        };
        assert!(cfg.normalize().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let mut cfg = base_config();
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8080);
        cfg.server.host = "not an ip".to_string();
        assert!(matches!(
            cfg.get_socket_addr(),
            Err(ConfigError::Address(..))
        ));
    }

    // Environment variables are process-wide; tests that touch them take this lock
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    const FALLBACK_VAR: &str = "SERVER_REWRITE__FALLBACK_EXTENSION";

    fn write_config(dir: &tempfile::TempDir, body: &str) -> String {
        let path = dir.path().join("proxy.toml");
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn load_with_env(path: &str, fallback: Option<&str>) -> Result<Config, ConfigError> {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match fallback {
            Some(value) => std::env::set_var(FALLBACK_VAR, value),
            None => std::env::remove_var(FALLBACK_VAR),
        }
        let result = Config::load_from(path);
        std::env::remove_var(FALLBACK_VAR);
        result
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [server]
            port = 9090

            [rewrite]
            fallback_extension = "png"
            "#,
        );
        let cfg = load_with_env(&path, None).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.rewrite.effective_fallback(), FallbackExtension::Png);
        assert_eq!(cfg.rewrite.special_path_overrides[0].path, "/main-layout");
    }

    #[test]
    fn test_load_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [rewrite]
            fallback_extension = "png"
            "#,
        );
        let cfg = load_with_env(&path, Some("webp")).unwrap();
        assert_eq!(cfg.rewrite.effective_fallback(), FallbackExtension::Webp);
    }

    #[test]
    fn test_load_env_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").to_string_lossy().into_owned();
        let cfg = load_with_env(&path, Some("png")).unwrap();
        assert_eq!(cfg.rewrite.effective_fallback(), FallbackExtension::Png);
        assert_eq!(
            cfg.rewrite.special_path_overrides,
            vec![PathOverride {
                path: "/main-layout".to_string(),
                extension: "html".to_string(),
            }]
        );
        assert_eq!(cfg.http.server_name, "asset-alias-proxy/0.1");
    }

    #[test]
    fn test_load_normalizes_override_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [rewrite]
            mode = "degraded"

            [[rewrite.special_path_overrides]]
            path = "/main-layout"
            extension = ".html"
            "#,
        );
        let cfg = load_with_env(&path, None).unwrap();
        assert_eq!(cfg.rewrite.special_path_overrides[0].extension, "html");
        assert_eq!(cfg.rewrite.effective_fallback(), FallbackExtension::Png);
    }

    #[test]
    fn test_load_rejects_invalid_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
            [[rewrite.special_path_overrides]]
            path = "main-layout"
            extension = "html"
            "#,
        );
        assert!(matches!(
            load_with_env(&path, None),
            Err(ConfigError::Validation(_))
        ));
    }
}
