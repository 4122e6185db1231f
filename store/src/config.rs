//! Connection and pool settings for [`ObservationStore`](crate::ObservationStore).

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::StoreError;
use crate::retry::RetryPolicy;
use crate::sql::TableRef;

/// Development database started alongside the service by docker-compose.
pub const DEFAULT_DATABASE_URL: &str =
    "postgresql://root@cockroach:26257/defaultdb?sslmode=disable";
pub const DEFAULT_NAMESPACE: &str = "observations";
pub const DEFAULT_TABLE: &str = "fl_lepidoptera";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_APPLICATION_NAME: &str = "helio";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Connection string carrying host, port, credentials and `sslmode`.
    pub database_url: String,
    pub namespace: String,
    pub table: String,
    pub max_connections: u32,
    /// How long an operation may wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// Server-side limit applied to every statement on every connection.
    pub statement_timeout: Duration,
    pub application_name: String,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn table_ref(&self) -> Result<TableRef, StoreError> {
        TableRef::new(&self.namespace, &self.table)
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, StoreError> {
        let options = PgConnectOptions::from_str(&self.database_url)
            .map_err(|e| StoreError::Configuration(format!("malformed database url: {e}")))?
            .application_name(&self.application_name)
            .options([(
                "statement_timeout",
                self.statement_timeout.as_millis().to_string(),
            )]);
        Ok(options)
    }

    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections.max(1))
            .acquire_timeout(self.acquire_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_compose_database() {
        let config = StoreConfig::default();
        let options = config.connect_options().unwrap();
        assert_eq!(options.get_host(), "cockroach");
        assert_eq!(options.get_port(), 26257);
        assert_eq!(options.get_database(), Some("defaultdb"));
        assert_eq!(options.get_username(), "root");
        assert_eq!(config.table_ref().unwrap().qualified(), "observations.fl_lepidoptera");
    }

    #[test]
    fn malformed_url_is_a_configuration_error() {
        let config = StoreConfig {
            database_url: "not a connection string".to_string(),
            ..Default::default()
        };
        let err = config.connect_options().unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)), "{err:?}");
    }

    #[test]
    fn invalid_table_name_is_a_configuration_error() {
        let config = StoreConfig {
            table: "observations; DROP TABLE x".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.table_ref(),
            Err(StoreError::Configuration(_))
        ));
    }
}
