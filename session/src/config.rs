use std::path::Path;

use database::DatabaseConfig;
use serde::Deserialize;

use crate::SessionError;

pub const APP_CODE_ENV: &str = "ASSASSIN_APP_CODE";

/// Settings read from an optional YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub pool_size: usize,
    /// Code that unlocks writes. Unset means any non-empty code works.
    pub app_code: Option<String>,
    /// Default number of finished games shown in the history.
    pub history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: 5,
            app_code: None,
            history_limit: 50,
        }
    }
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, SessionError> {
        serde_yaml::from_str(yaml).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Reads the file if one is given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let mut config = match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
                Self::from_yaml(&yaml)?
            }
            None => Self::default(),
        };
        if let Ok(code) = std::env::var(APP_CODE_ENV) {
            config.app_code = Some(code);
        }
        Ok(config)
    }

    pub fn database_config(&self, cli_url: Option<String>) -> DatabaseConfig {
        DatabaseConfig::from_cli_or_env_or_yaml(cli_url, self.database_url.clone())
            .with_pool_size(self.pool_size)
    }
}
