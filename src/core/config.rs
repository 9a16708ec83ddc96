//! Layered application configuration: defaults, optional TOML file, `COMMONGOOD_*` env

use crate::core::service::ServiceError;
use ::config::{Config, Environment as EnvSource, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Secret shipped in the defaults; refused when running in production
pub const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production";

/// Base name of the optional config file looked up in the working directory
pub const DEFAULT_CONFIG_NAME: &str = "commongood";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS; empty allows any origin
    pub allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    #[default]
    Local,
    Cloudinary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    pub local_dir: PathBuf,
    /// URL prefix for locally stored files; served by the API when it starts with `/`
    pub public_base_url: String,
    pub cloudinary: CloudinaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            allowed_origins: Vec::new(),
            // five 10 MiB photos plus form fields
            body_limit_bytes: 60 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("commongood.db"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_issuer: "commongood".to_string(),
            jwt_expiry_seconds: 90 * 24 * 60 * 60,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Local,
            local_dir: PathBuf::from("uploads"),
            public_base_url: "/media".to_string(),
            cloudinary: CloudinaryConfig::default(),
        }
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            api_base_url: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from defaults, a TOML file and the environment.
    ///
    /// With `path = None` the file `commongood.toml` is used when present. An
    /// explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ServiceError> {
        let defaults = Config::try_from(&AppConfig::default()).map_err(config_error)?;

        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let env = EnvSource::with_prefix("COMMONGOOD")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins");

        let config: AppConfig = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot run safely
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ServiceError::Config("auth.jwt_secret must not be empty".to_string()));
        }
        if self.environment == Environment::Production && self.auth.jwt_secret == DEV_JWT_SECRET {
            return Err(ServiceError::Config(
                "auth.jwt_secret must be changed from the development default in production"
                    .to_string(),
            ));
        }
        if self.auth.jwt_expiry_seconds == 0 {
            return Err(ServiceError::Config(
                "auth.jwt_expiry_seconds must be positive".to_string(),
            ));
        }
        if self.media.backend == MediaBackend::Cloudinary {
            let c = &self.media.cloudinary;
            let mut missing = Vec::new();
            if c.cloud_name.is_empty() {
                missing.push("cloud_name");
            }
            if c.api_key.is_empty() {
                missing.push("api_key");
            }
            if c.api_secret.is_empty() {
                missing.push("api_secret");
            }
            if !missing.is_empty() {
                return Err(ServiceError::Config(format!(
                    "Cloudinary media backend selected but media.cloudinary is missing: {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn config_error(err: ::config::ConfigError) -> ServiceError {
    ServiceError::Config(err.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.environment.is_development());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.path, PathBuf::from("commongood.db"));
        assert_eq!(config.auth.jwt_expiry_seconds, 7_776_000);
        assert_eq!(config.media.backend, MediaBackend::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("commongood.toml");
        fs::write(
            &path,
            r#"
environment = "production"

[server]
port = 8080
allowed_origins = ["http://localhost:3000"]

[auth]
jwt_secret = "a-real-secret"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.auth.jwt_issuer, "commongood");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_production_rejects_dev_secret() {
        let config = AppConfig {
            environment: Environment::Production,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cloudinary_requires_credentials() {
        let mut config = AppConfig::default();
        config.media.backend = MediaBackend::Cloudinary;
        config.media.cloudinary.cloud_name = "demo".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api_key"));
        assert!(err.contains("api_secret"));
    }
}
