use std::env;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenConfig,
    pub lockout: LockoutConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_minutes: i64,
}

/// Lifetimes of the one-time verification and reset tokens.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub verify_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockoutConfig {
    pub max_login_attempts: u32,
    pub window_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub mode: MailMode,
    /// Mail API endpoint; required in `http` mode.
    pub api_url: Option<String>,
    pub from: String,
    /// Base URL for verification and reset links embedded in mail.
    pub link_base_url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailMode {
    /// Write mail to the log instead of delivering it.
    Log,
    /// Deliver through the configured mail API.
    Http,
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, SERVER__HTTP_PORT, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: DATABASE__URL=postgres://... overrides database.url
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject configurations that would start a broken service.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::Message(
                "jwt.secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.jwt.access_token_minutes <= 0 || self.jwt.refresh_token_minutes <= 0 {
            return Err(ConfigError::Message(
                "jwt token lifetimes must be positive".to_string(),
            ));
        }
        if self.tokens.verify_ttl_minutes <= 0 || self.tokens.reset_ttl_minutes <= 0 {
            return Err(ConfigError::Message(
                "token lifetimes must be positive".to_string(),
            ));
        }
        if self.lockout.max_login_attempts == 0 || self.lockout.window_minutes <= 0 {
            return Err(ConfigError::Message(
                "lockout requires a positive attempt count and window".to_string(),
            ));
        }
        if self.mail.mode == MailMode::Http && self.mail.api_url.is_none() {
            return Err(ConfigError::Message(
                "mail.api_url is required when mail.mode is http".to_string(),
            ));
        }
        Ok(())
    }
}
