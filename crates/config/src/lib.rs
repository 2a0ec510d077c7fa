use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "circleup.toml",
    "config/circleup.toml",
    "crates/config/circleup.toml",
    "../circleup.toml",
    "../config/circleup.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://circleup.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Token lifetimes for the session layer. Access tokens are short-lived and
/// renewed silently through the refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_access_ttl")]
    pub access_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_refresh_ttl")]
    pub refresh_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_seconds: Self::default_access_ttl(),
            refresh_ttl_seconds: Self::default_refresh_ttl(),
        }
    }
}

impl AuthConfig {
    fn default_access_ttl() -> u64 {
        900
    }

    fn default_refresh_ttl() -> u64 {
        2_592_000
    }
}

/// Load the application configuration by combining defaults, an optional TOML
/// file, and environment overrides.
///
/// ```
/// use circleup_config::load;
///
/// std::env::remove_var("CIRCLEUP_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .unwrap()
        .set_default(
            "auth.access_ttl_seconds",
            i64::try_from(defaults.auth.access_ttl_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default(
            "auth.refresh_ttl_seconds",
            i64::try_from(defaults.auth.refresh_ttl_seconds).unwrap_or(i64::MAX),
        )
        .unwrap();

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CIRCLEUP_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CIRCLEUP_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(config::Environment::with_prefix("CIRCLEUP").separator("__"));

    let cfg = builder.build().context("unable to build configuration")?;

    cfg.try_deserialize::<AppConfig>()
        .context("invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write as _;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 7080);
        assert!(config.database.url.starts_with("sqlite://"));
        assert!(config.auth.access_ttl_seconds < config.auth.refresh_ttl_seconds);
    }

    #[test]
    #[serial]
    fn load_reads_file_pointed_to_by_env() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[http]\naddress = \"0.0.0.0\"\nport = 9000").unwrap();

        std::env::set_var("CIRCLEUP_CONFIG", file.path());
        let config = load().unwrap();
        std::env::remove_var("CIRCLEUP_CONFIG");

        assert_eq!(config.http.address, "0.0.0.0");
        assert_eq!(config.http.port, 9000);
        // Untouched sections keep their defaults.
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    #[serial]
    fn environment_overrides_win() {
        std::env::remove_var("CIRCLEUP_CONFIG");
        std::env::set_var("CIRCLEUP_DATABASE__URL", "sqlite://override.db");

        let config = load().unwrap();
        std::env::remove_var("CIRCLEUP_DATABASE__URL");

        assert_eq!(config.database.url, "sqlite://override.db");
    }
}
