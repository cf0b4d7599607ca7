//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`medisync.toml`, or the path in `MEDISYNC_CONFIG`), then environment
//! variables such as `MEDISYNC__SERVER__PORT=8080`.

use medisync_terminology::{SearchLimits, ValidationMode, DEFAULT_CLASSIFICATION_SYSTEMS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "medisync.toml";
const ENV_PREFIX: &str = "MEDISYNC";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub terminology: TerminologyConfig,
    pub classification: ClassificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty disables CORS headers
    pub cors_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory store is used when unset
    pub url: Option<String>,
    pub pool_max_size: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminologyConfig {
    pub default_search_limit: usize,
    pub max_search_limit: usize,
    pub classification_systems: Vec<String>,
    pub validation_mode: ValidationMode,
    /// Overall deadline for one bundle upload
    pub bundle_timeout_ms: Option<u64>,
    /// Used for uploads that name neither the code system nor its URL
    pub default_ingest_name: Option<String>,
    pub default_ingest_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub base_url: String,
    pub token_endpoint: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub release: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file_enabled: bool,
    pub file_directory: String,
    pub file_prefix: String,
    /// daily | hourly | minutely | never
    pub file_rotation: String,
    pub opentelemetry_enabled: bool,
    pub otlp_endpoint: String,
    pub otlp_timeout_seconds: u64,
    pub trace_sample_ratio: f64,
    pub service_name: String,
    pub deployment_environment: String,
    pub audit_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                cors_origins: Vec::new(),
                max_request_body_size: 10 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: None,
                pool_max_size: 10,
                run_migrations: true,
            },
            terminology: TerminologyConfig {
                default_search_limit: 20,
                max_search_limit: 100,
                classification_systems: DEFAULT_CLASSIFICATION_SYSTEMS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                validation_mode: ValidationMode::Advisory,
                bundle_timeout_ms: None,
                default_ingest_name: Some("NAMASTE".to_string()),
                default_ingest_url: Some("http://terminology.india.gov.in/namaste".to_string()),
            },
            classification: ClassificationConfig {
                base_url: "https://id.who.int/icd".to_string(),
                token_endpoint: "https://icdaccessmanagement.who.int/connect/token".to_string(),
                client_id: None,
                client_secret: None,
                release: "2024-01".to_string(),
                timeout_seconds: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
                file_enabled: false,
                file_directory: "logs".to_string(),
                file_prefix: "medisync".to_string(),
                file_rotation: "daily".to_string(),
                opentelemetry_enabled: false,
                otlp_endpoint: "http://localhost:4317".to_string(),
                otlp_timeout_seconds: 10,
                trace_sample_ratio: 1.0,
                service_name: "medisync".to_string(),
                deployment_environment: "development".to_string(),
                audit_enabled: true,
            },
        }
    }
}

impl Config {
    /// Load defaults, the optional config file and `MEDISYNC__*` environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let path = std::env::var(format!("{}_CONFIG", ENV_PREFIX))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let defaults = config::Config::try_from(&Config::default())?;

        config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .with_list_parse_key("terminology.classification_systems")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject combinations the service cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must not be 0".to_string());
        }

        let t = &self.terminology;
        if t.default_search_limit == 0 {
            return Err("terminology.default_search_limit must be at least 1".to_string());
        }
        if t.default_search_limit > t.max_search_limit {
            return Err(format!(
                "terminology.default_search_limit ({}) exceeds max_search_limit ({})",
                t.default_search_limit, t.max_search_limit
            ));
        }
        for system in &t.classification_systems {
            if url::Url::parse(system).is_err() {
                return Err(format!(
                    "terminology.classification_systems contains an invalid URI: {}",
                    system
                ));
            }
        }

        if let Some(url) = t.default_ingest_url.as_deref() {
            if url::Url::parse(url).is_err() {
                return Err(format!(
                    "terminology.default_ingest_url is not a valid URI: {}",
                    url
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.logging.trace_sample_ratio) {
            return Err(format!(
                "logging.trace_sample_ratio must be within [0, 1], got {}",
                self.logging.trace_sample_ratio
            ));
        }
        match self.logging.file_rotation.to_lowercase().as_str() {
            "daily" | "hourly" | "minutely" | "never" => {}
            other => return Err(format!("logging.file_rotation is unknown: {}", other)),
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            default_limit: self.terminology.default_search_limit,
            max_limit: self.terminology.max_search_limit,
        }
    }

    pub fn bundle_timeout(&self) -> Option<Duration> {
        self.terminology.bundle_timeout_ms.map(Duration::from_millis)
    }

    /// Name and canonical URL for uploads that supply neither
    pub fn default_ingest_target(&self) -> Option<(&str, &str)> {
        match (
            self.terminology.default_ingest_name.as_deref(),
            self.terminology.default_ingest_url.as_deref(),
        ) {
            (Some(name), Some(url)) if !name.is_empty() && !url.is_empty() => Some((name, url)),
            _ => None,
        }
    }
}

impl ClassificationConfig {
    /// The authority client runs only with both credentials
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search_limits().default_limit, 20);
        assert!(config.classification.credentials().is_none());
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
        assert_eq!(
            config.default_ingest_target(),
            Some(("NAMASTE", "http://terminology.india.gov.in/namaste"))
        );
    }

    #[test]
    fn rejects_bad_limits_and_ratio() {
        let mut config = Config::default();
        config.terminology.default_search_limit = 500;
        assert!(config.validate().unwrap_err().contains("max_search_limit"));

        let mut config = Config::default();
        config.logging.trace_sample_ratio = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.file_rotation = "weekly".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.terminology.classification_systems = vec!["not a uri".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.terminology.default_ingest_url = Some("namaste".to_string());
        assert!(config.validate().unwrap_err().contains("default_ingest_url"));
    }

    #[test]
    fn credentials_need_both_halves() {
        let mut config = Config::default();
        config.classification.client_id = Some("id".to_string());
        assert!(config.classification.credentials().is_none());
        config.classification.client_secret = Some("secret".to_string());
        assert_eq!(config.classification.credentials(), Some(("id", "secret")));
    }
}
