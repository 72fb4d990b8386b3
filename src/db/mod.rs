// src/db/mod.rs
pub mod import;
pub mod statements;
#[cfg(test)]
pub mod testing;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::error::SetupError;

/// Shared handle to the destination MySQL database.
#[derive(Clone)]
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    /// Open a pool sized by `import.max_connections`. Fails when the first
    /// connection cannot be established.
    pub async fn connect(config: &Config) -> Result<Self, SetupError> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.import.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(SetupError::Connection)?;

        info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.import.max_connections,
            "connected"
        );
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}
