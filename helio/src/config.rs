//! Runtime configuration for the helio binary.
//!
//! Every value has a compiled-in default and can be overridden through a
//! dedicated environment variable. Numeric variables that fail to parse fall
//! back to their default.

use std::path::PathBuf;
use std::time::Duration;

use helio_store::{
    StoreConfig, DEFAULT_DATABASE_URL, DEFAULT_MAX_CONNECTIONS, DEFAULT_NAMESPACE,
    DEFAULT_STATEMENT_TIMEOUT, DEFAULT_TABLE,
};

/// Default seed fixture, relative to the working directory.
const DEFAULT_SEED_PATH: &str = "data/monarch.json";

/// Default per-operation timeout (in seconds).
const DEFAULT_OP_TIMEOUT_SECS: u64 = 30;

/// Get the database connection string.
///
/// Priority:
/// 1. `HELIO_DATABASE_URL` env variable if set
/// 2. the local CockroachDB started by docker-compose
pub fn get_database_url() -> String {
    std::env::var("HELIO_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Get the namespace (schema) holding the observations table.
pub fn get_namespace() -> String {
    std::env::var("HELIO_DB_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string())
}

pub fn get_table() -> String {
    std::env::var("HELIO_DB_TABLE").unwrap_or_else(|_| DEFAULT_TABLE.to_string())
}

pub fn get_max_connections() -> u32 {
    if let Ok(max) = std::env::var("HELIO_DB_MAX_CONNECTIONS") {
        return max.parse().unwrap_or(DEFAULT_MAX_CONNECTIONS);
    }

    DEFAULT_MAX_CONNECTIONS
}

/// Get the server-side statement timeout in seconds.
///
/// Priority:
/// 1. `HELIO_STATEMENT_TIMEOUT_SECS` env variable if set (falls back to the
///    default if the value cannot be parsed as a `u64`)
/// 2. `30` seconds as fallback
pub fn get_statement_timeout_secs() -> u64 {
    if let Ok(timeout) = std::env::var("HELIO_STATEMENT_TIMEOUT_SECS") {
        return timeout
            .parse()
            .unwrap_or(DEFAULT_STATEMENT_TIMEOUT.as_secs());
    }

    DEFAULT_STATEMENT_TIMEOUT.as_secs()
}

/// Get the seed fixture loaded at bootstrap.
///
/// Priority:
/// 1. `HELIO_SEED_PATH` env variable if set
/// 2. `data/monarch.json` as fallback
pub fn get_seed_path() -> PathBuf {
    if let Ok(path) = std::env::var("HELIO_SEED_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_SEED_PATH)
}

/// Get the per-operation timeout in seconds. `0` disables the deadline.
pub fn get_op_timeout_secs() -> u64 {
    if let Ok(timeout) = std::env::var("HELIO_OP_TIMEOUT_SECS") {
        return timeout.parse().unwrap_or(DEFAULT_OP_TIMEOUT_SECS);
    }

    DEFAULT_OP_TIMEOUT_SECS
}

/// Get the directory for rolling log files.
///
/// Returns `None` unless `HELIO_LOG_DIR` is set, in which case logs go to a
/// daily file there instead of stderr.
pub fn get_log_dir() -> Option<PathBuf> {
    std::env::var("HELIO_LOG_DIR").ok().map(PathBuf::from)
}

/// Assemble the store settings from the environment.
pub fn store_config() -> StoreConfig {
    StoreConfig {
        database_url: get_database_url(),
        namespace: get_namespace(),
        table: get_table(),
        max_connections: get_max_connections(),
        statement_timeout: Duration::from_secs(get_statement_timeout_secs()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_database_url() {
        let url = get_database_url();
        match std::env::var("HELIO_DATABASE_URL") {
            Ok(val) => assert_eq!(url, val),
            Err(_) => assert_eq!(url, DEFAULT_DATABASE_URL),
        }
    }

    #[test]
    fn test_get_namespace_and_table() {
        match std::env::var("HELIO_DB_NAMESPACE") {
            Ok(val) => assert_eq!(get_namespace(), val),
            Err(_) => assert_eq!(get_namespace(), DEFAULT_NAMESPACE),
        }
        match std::env::var("HELIO_DB_TABLE") {
            Ok(val) => assert_eq!(get_table(), val),
            Err(_) => assert_eq!(get_table(), DEFAULT_TABLE),
        }
    }

    #[test]
    fn test_get_seed_path() {
        let path = get_seed_path();
        match std::env::var("HELIO_SEED_PATH") {
            Ok(val) => assert_eq!(path, PathBuf::from(val)),
            Err(_) => assert_eq!(path, PathBuf::from(DEFAULT_SEED_PATH)),
        }
    }

    #[test]
    fn test_get_op_timeout_secs_default() {
        if std::env::var("HELIO_OP_TIMEOUT_SECS").is_err() {
            assert_eq!(get_op_timeout_secs(), DEFAULT_OP_TIMEOUT_SECS);
        }
    }

    #[test]
    fn test_store_config_carries_statement_timeout() {
        let config = store_config();
        assert_eq!(
            config.statement_timeout,
            Duration::from_secs(get_statement_timeout_secs())
        );
        assert_eq!(config.max_connections, get_max_connections());
    }
}
