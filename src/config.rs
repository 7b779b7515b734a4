use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web Server
    pub web_host: String,
    pub web_port: u16,

    // Database
    pub database_path: PathBuf,

    // Bootstrap admin seeded at initialization
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/lenspost.sqlite")),
            admin_username: env_or_default("ADMIN_USERNAME", "admin"),
            admin_password: env_or_default("ADMIN_PASSWORD", "changeme123"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_username.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "ADMIN_USERNAME".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.admin_password.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "ADMIN_PASSWORD".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_default() {
        assert_eq!(env_or_default("LENSPOST_NONEXISTENT_VAR", "x"), "x");
    }

    #[test]
    fn test_parse_u16_default() {
        assert_eq!(parse_env_u16("LENSPOST_NONEXISTENT_PORT", 8080).unwrap(), 8080);
    }

    #[test]
    fn test_validate_rejects_empty_admin() {
        let config = Config {
            web_host: "0.0.0.0".to_string(),
            web_port: 8080,
            database_path: PathBuf::from("./x.sqlite"),
            admin_username: String::new(),
            admin_password: "secret123".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
