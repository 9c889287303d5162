use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use super::ConfigError;
use crate::cli::Cli;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub qualifier: Option<QualifierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix when deployed behind a reverse proxy (e.g. "/analytics").
    #[serde(default)]
    pub url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            url_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared dashboard password, also accepted as a bearer token.
    #[serde(default = "default_token", deserialize_with = "deserialize_secret")]
    pub token: SecretString,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { token: default_token() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Rows per page on paginated tables.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Hard cap on CSV export row counts.
    #[serde(default = "default_export_limit")]
    pub export_limit: i64,
    /// Row cap for per-site detail listings.
    #[serde(default = "default_detail_limit")]
    pub detail_limit: i64,
    /// Row cap for dropdown option queries.
    #[serde(default = "default_options_limit")]
    pub options_limit: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            export_limit: default_export_limit(),
            detail_limit: default_detail_limit(),
            options_limit: default_options_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for dropdown option lists.
    #[serde(default = "default_options_ttl")]
    pub options_ttl_secs: u64,
    /// TTL for aggregate slider-bound statistics.
    #[serde(default = "default_stats_ttl")]
    pub stats_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            options_ttl_secs: default_options_ttl(),
            stats_ttl_secs: default_stats_ttl(),
        }
    }
}

/// External qualification service. When absent, the per-site "process"
/// control is not rendered at all.
#[derive(Debug, Clone, Deserialize)]
pub struct QualifierConfig {
    pub base_url: String,
    #[serde(default = "default_token", deserialize_with = "deserialize_secret")]
    pub token: SecretString,
    /// Public URL for qualification report links, if different from base_url.
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl QualifierConfig {
    pub fn report_url(&self, site_id: &str) -> String {
        let base = self
            .public_url
            .as_deref()
            .unwrap_or(&self.base_url)
            .trim_end_matches('/');
        format!("{base}/results/{site_id}")
    }
}

impl Config {
    pub fn load(args: &Cli) -> Result<Self, ConfigError> {
        let config_path = args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("config.yaml"));

        let mut config = if config_path.is_file() {
            Self::load_from_file(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database.path cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if secrecy::ExposeSecret::expose_secret(&self.auth.token).is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.token cannot be empty; set ECO_AUTH_TOKEN".to_string(),
            ));
        }

        if !self.server.url_prefix.is_empty() && !self.server.url_prefix.starts_with('/') {
            return Err(ConfigError::InvalidConfig(
                "server.url_prefix must start with '/'".to_string(),
            ));
        }

        if let Some(qualifier) = &self.qualifier {
            url::Url::parse(&qualifier.base_url).map_err(|e| {
                ConfigError::InvalidConfig(format!("qualifier.base_url is not a valid URL: {e}"))
            })?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("ECO_AUTH_TOKEN") {
            self.auth.token = SecretString::from(value);
        }
        if let Ok(value) = std::env::var("ECO_URL_PREFIX") {
            self.server.url_prefix = value;
        }
        if let Ok(value) = std::env::var("ECO_QUALIFIER_URL") {
            let qualifier = self.qualifier.get_or_insert_with(|| QualifierConfig {
                base_url: String::new(),
                token: default_token(),
                public_url: None,
                cooldown_secs: default_cooldown(),
            });
            qualifier.base_url = value;
        }
        if let Ok(value) = std::env::var("ECO_QUALIFIER_TOKEN") {
            if let Some(qualifier) = self.qualifier.as_mut() {
                qualifier.token = SecretString::from(value);
            }
        }
    }

    fn apply_cli_overrides(&mut self, args: &Cli) {
        if let Some(path) = &args.db_path {
            self.database.path = path.clone();
        }
        if let Some(bind) = &args.bind_address {
            self.server.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::from(raw))
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_token() -> SecretString {
    SecretString::from("")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/ecology_sites.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_page_size() -> i64 {
    500
}

fn default_export_limit() -> i64 {
    50_000
}

fn default_detail_limit() -> i64 {
    2000
}

fn default_options_limit() -> i64 {
    10_000
}

fn default_options_ttl() -> u64 {
    600
}

fn default_stats_ttl() -> u64 {
    60
}

fn default_cooldown() -> u64 {
    600
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn base_cli() -> Cli {
        Cli {
            config: None,
            db_path: None,
            bind_address: None,
            port: None,
        }
    }

    #[test]
    fn defaults_fill_every_section() {
        let config: Config = serde_yaml::from_str("{}").expect("parse empty config");
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.limits.page_size, 500);
        assert_eq!(config.cache.options_ttl_secs, 600);
        assert!(config.qualifier.is_none());
    }

    #[test]
    fn parses_full_yaml() {
        let yaml = r#"
server:
  bind_address: 127.0.0.1
  port: 9100
  url_prefix: /analytics
auth:
  token: hunter2
database:
  path: /srv/eco/sites.db
logging:
  level: debug
  format: json
qualifier:
  base_url: http://localhost:5001
  token: qual-secret
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse yaml");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.auth.token.expose_secret(), "hunter2");
        assert_eq!(config.database.path, PathBuf::from("/srv/eco/sites.db"));
        let qualifier = config.qualifier.expect("qualifier section");
        assert_eq!(qualifier.report_url("123"), "http://localhost:5001/results/123");
        assert_eq!(qualifier.cooldown_secs, 600);
    }

    #[test]
    fn validate_rejects_empty_token() {
        let config: Config = serde_yaml::from_str("{}").expect("parse");
        let err = config.validate().expect_err("empty token must fail");
        assert!(err.to_string().contains("auth.token"));
    }

    #[test]
    fn validate_rejects_bad_prefix() {
        let mut config: Config = serde_yaml::from_str("auth:\n  token: x\n").expect("parse");
        config.server.url_prefix = "analytics".to_string();
        let err = config.validate().expect_err("prefix without slash must fail");
        assert!(err.to_string().contains("url_prefix"));
    }

    #[test]
    fn cli_overrides_win() {
        let mut config: Config = serde_yaml::from_str("auth:\n  token: x\n").expect("parse");
        let args = Cli {
            db_path: Some(PathBuf::from("/tmp/other.db")),
            port: Some(9200),
            ..base_cli()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.server.port, 9200);
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let config: Config =
            serde_yaml::from_str("auth:\n  token: super-secret\n").expect("parse");
        let rendered = format!("{:?}", config.auth);
        assert!(!rendered.contains("super-secret"));
    }
}
