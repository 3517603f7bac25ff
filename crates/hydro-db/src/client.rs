//! Database client and connection management

use crate::{DbError, DbResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Database client wrapping an sqlx connection pool
#[derive(Clone)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    /// Create a new database client from a connection string
    pub async fn new(database_url: &str, max_connections: u32) -> DbResult<Self> {
        if database_url.trim().is_empty() {
            return Err(DbError::ConfigError("empty database URL".into()));
        }
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to readings database");
        Ok(Self { pool })
    }

    /// Create a new database client with custom options
    pub async fn with_options(opts: PgConnectOptions, max_connections: u32) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Test the database connection
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Build PostgreSQL connection options from components
pub struct DbConnectionBuilder {
    base: Option<String>,
    host: String,
    port: u16,
    database: String,
    username: String,
    password: Option<String>,
}

impl DbConnectionBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            base: None,
            host: "localhost".to_string(),
            port: 5432,
            database: database.into(),
            username: "postgres".to_string(),
            password: None,
        }
    }

    /// Start from a connection URL; the credential is supplied separately
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            base: Some(url.into()),
            ..Self::new("postgres")
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn build(self) -> DbResult<PgConnectOptions> {
        let mut opts = match &self.base {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(|e| DbError::ConfigError(e.to_string()))?,
            None => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.database)
                .username(&self.username),
        };

        if let Some(password) = self.password {
            opts = opts.password(&password);
        }

        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_builder() {
        let opts = DbConnectionBuilder::new("hydro")
            .host("db.example.com")
            .port(6543)
            .username("reader")
            .password("secret")
            .build()
            .unwrap();

        assert_eq!(opts.get_host(), "db.example.com");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_database(), Some("hydro"));
        assert_eq!(opts.get_username(), "reader");
    }

    #[test]
    fn test_builder_from_url() {
        let opts = DbConnectionBuilder::from_url("postgres://viewer@db.example.com:5433/readings")
            .password("token")
            .build()
            .unwrap();

        assert_eq!(opts.get_host(), "db.example.com");
        assert_eq!(opts.get_port(), 5433);
        assert_eq!(opts.get_database(), Some("readings"));
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = DbConnectionBuilder::from_url("not a url").build();
        assert!(matches!(result, Err(DbError::ConfigError(_))));
    }
}
