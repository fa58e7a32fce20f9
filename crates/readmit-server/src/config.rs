//! Server configuration from the environment

use readmit_common::env::{env_optional, env_or, env_string_or};
use readmit_etl::EtlConfig;
use serde::{Deserialize, Serialize};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Seconds allowed for draining on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/readmit";

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Ten minutes
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Local front-end during development
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Collaborator Defaults
// ============================================================================

pub const DEFAULT_PREDICTION_URL: &str = "http://localhost:8501/predict";

pub const DEFAULT_LLM_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-pro";

pub const DEFAULT_TTS_URL: &str = "http://localhost:5002/tts";

pub const DEFAULT_MAIL_API_URL: &str = "http://localhost:8025/api/send";

pub const DEFAULT_MAIL_SENDER: &str = "care-team@localhost";

/// Timeout for each outbound collaborator request. LLM calls are slow.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 120;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub services: ServicesConfig,
    /// Settings for the upload pipeline, shared with the batch loader
    pub pipeline: EtlConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Endpoints of the external collaborators
#[derive(Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub prediction_url: String,
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub tts_url: String,
    pub mail_api_url: String,
    pub mail_api_key: Option<String>,
    pub mail_sender: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ServicesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesConfig")
            .field("prediction_url", &self.prediction_url)
            .field("llm_api_url", &self.llm_api_url)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<redacted>"))
            .field("llm_model", &self.llm_model)
            .field("tts_url", &self.tts_url)
            .field("mail_api_url", &self.mail_api_url)
            .field("mail_api_key", &self.mail_api_key.as_ref().map(|_| "<redacted>"))
            .field("mail_sender", &self.mail_sender)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            prediction_url: DEFAULT_PREDICTION_URL.to_string(),
            llm_api_url: DEFAULT_LLM_API_URL.to_string(),
            llm_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
            mail_api_url: DEFAULT_MAIL_API_URL.to_string(),
            mail_api_key: None,
            mail_sender: DEFAULT_MAIL_SENDER.to_string(),
            timeout_secs: DEFAULT_SERVICE_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_string_or("READMIT_HOST", DEFAULT_SERVER_HOST),
                port: env_or("READMIT_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "READMIT_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            database: DatabaseConfig {
                url: env_string_or("DATABASE_URL", DEFAULT_DATABASE_URL),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            cors: CorsConfig {
                allowed_origins: env_string_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
            services: ServicesConfig {
                prediction_url: env_string_or("PREDICTION_URL", DEFAULT_PREDICTION_URL),
                llm_api_url: env_string_or("LLM_API_URL", DEFAULT_LLM_API_URL),
                llm_api_key: env_optional("LLM_API_KEY"),
                llm_model: env_string_or("LLM_MODEL", DEFAULT_LLM_MODEL),
                tts_url: env_string_or("TTS_URL", DEFAULT_TTS_URL),
                mail_api_url: env_string_or("MAIL_API_URL", DEFAULT_MAIL_API_URL),
                mail_api_key: env_optional("MAIL_API_KEY"),
                mail_sender: env_string_or("MAIL_SENDER", DEFAULT_MAIL_SENDER),
                timeout_secs: env_or("SERVICE_TIMEOUT_SECS", DEFAULT_SERVICE_TIMEOUT_SECS),
            },
            pipeline: EtlConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("READMIT_PORT must be non-zero");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be non-zero");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; any origin is accepted");
        }

        if self.services.timeout_secs == 0 {
            anyhow::bail!("Service timeout must be greater than 0");
        }

        for (name, url) in [
            ("PREDICTION_URL", &self.services.prediction_url),
            ("LLM_API_URL", &self.services.llm_api_url),
            ("TTS_URL", &self.services.tts_url),
            ("MAIL_API_URL", &self.services.mail_api_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{} must be an http(s) URL, got '{}'", name, url);
            }
        }

        if self.services.llm_api_key.is_none() {
            tracing::warn!("LLM_API_KEY not set - care plan generation will fail");
        }

        self.pipeline.validate()?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            services: ServicesConfig::default(),
            pipeline: EtlConfig::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_pool() {
        let mut config = Config::default();
        config.database.min_connections = 20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_connections"));
    }

    #[test]
    fn test_validation_rejects_non_http_collaborator() {
        let mut config = Config::default();
        config.services.tts_url = "ftp://speech".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TTS_URL"));
    }

    #[test]
    fn test_api_keys_are_redacted_in_debug() {
        let services = ServicesConfig {
            llm_api_key: Some("secret-key".to_string()),
            ..ServicesConfig::default()
        };
        let debug = format!("{:?}", services);
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_load_from_environment() {
        std::env::set_var("READMIT_PORT", "9100");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "http://a.test, http://b.test");
        std::env::set_var("LLM_MODEL", "gemini-test");

        let config = Config::load().unwrap();

        std::env::remove_var("READMIT_PORT");
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
        std::env::remove_var("LLM_MODEL");

        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.services.llm_model, "gemini-test");
    }
}
