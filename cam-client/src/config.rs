//! Configuration loading for the CAM terminal client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use cam_core::EntityKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub auth: ClientAuth,
    pub request_timeout_ms: u64,
    /// Rows per page on every list page.
    pub page_size: u32,
    /// Entity shown at startup, by singular name.
    pub start_entity: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientAuth {
    pub jwt: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or CAM_CLIENT_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.auth.jwt.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "auth.jwt",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_size",
                reason: "must be > 0".to_string(),
            });
        }
        if self.entity().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "start_entity",
                reason: format!("unknown entity '{}'", self.start_entity),
            });
        }
        Ok(())
    }

    pub fn entity(&self) -> Option<EntityKind> {
        EntityKind::from_name(self.start_entity.trim())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("CAM_CLIENT_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
api_base_url = "http://localhost:3000"
request_timeout_ms = 5000
page_size = 20
start_entity = "allegation"

[auth]
jwt = "token"
"#;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_loads() {
        let file = write(VALID);
        let config = ClientConfig::from_path(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.entity(), Some(EntityKind::Allegation));
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write(&VALID.replace("page_size = 20", "page_size = 20\ntheme = \"dark\""));
        assert!(matches!(
            ClientConfig::from_path(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let file = write(&VALID.replace("allegation", "witness"));
        let config = ClientConfig::from_path(file.path()).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "start_entity", .. })
        ));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let file = write(&VALID.replace("page_size = 20", "page_size = 0"));
        let config = ClientConfig::from_path(file.path()).unwrap();
        assert!(config.validate().is_err());
    }
}
