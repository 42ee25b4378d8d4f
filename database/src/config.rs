use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub fn from_cli_or_env_or_yaml(cli_arg: Option<String>, yaml_config: Option<String>) -> Self {
        let url = if let Some(arg) = cli_arg {
            arg
        } else if let Ok(env) = std::env::var("DATABASE_URL") {
            env
        } else if let Some(yaml) = yaml_config {
            yaml
        } else {
            "sqlite::memory:".to_string()
        };

        Self { url, pool_size: 5 }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub async fn create_pool(&self) -> Result<sqlx::SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(true);

        // every connection to an in-memory database is a fresh database
        let pool_options = if self.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(self.pool_size as u32)
        };

        pool_options.connect_with(options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let config = DatabaseConfig::from_cli_or_env_or_yaml(
            Some("sqlite://cli.db".to_string()),
            Some("sqlite://yaml.db".to_string()),
        );
        assert_eq!(config.url, "sqlite://cli.db");
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_pool_size_is_at_least_one() {
        let config = DatabaseConfig::from_cli_or_env_or_yaml(Some("sqlite::memory:".into()), None)
            .with_pool_size(0);
        assert_eq!(config.pool_size, 1);
        assert!(config.is_in_memory());
    }
}
