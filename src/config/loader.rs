//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `app.project_id`.
pub const PROJECT_ID_ENV_VAR: &str = "PRESALE_PROJECT_ID";
/// Environment variable overriding `chain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "PRESALE_RPC_URL";
/// Environment variable overriding `wallet.relay_url`.
pub const RELAY_URL_ENV_VAR: &str = "PRESALE_RELAY_URL";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied between parsing and validation, so
/// a file with no `project_id` still passes when `PRESALE_PROJECT_ID`
/// is set. Anything missing after that fails fast here rather than as
/// an obscure error mid-flow.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: AppConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults plus environment overrides only.
///
/// Used when no config file is given; validation still applies.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(project_id) = std::env::var(PROJECT_ID_ENV_VAR) {
        if !project_id.is_empty() {
            config.app.project_id = project_id;
        }
    }
    if let Ok(rpc_url) = std::env::var(RPC_URL_ENV_VAR) {
        if !rpc_url.is_empty() {
            config.chain.rpc_url = rpc_url;
        }
    }
    if let Ok(relay_url) = std::env::var(RELAY_URL_ENV_VAR) {
        if !relay_url.is_empty() {
            config.wallet.relay_url = relay_url;
        }
    }
}
