//! Failure taxonomy for the observation store.
//!
//! Every driver error is classified once, at the store boundary, into a
//! [`StoreError`]. Callers branch on [`StoreError::kind`] rather than on
//! message text.

use std::fmt;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE for `serialization_failure`. CockroachDB reports every
/// retryable transaction conflict with this code.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for `duplicate_table`.
const DUPLICATE_TABLE: &str = "42P07";

/// Point in a transaction's life at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Execute,
    Commit,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStage::Begin => f.write_str("begin"),
            TxStage::Execute => f.write_str("execute"),
            TxStage::Commit => f.write_str("commit"),
        }
    }
}

/// Schema object a bootstrap step was creating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaObject {
    Namespace,
    Table,
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaObject::Namespace => f.write_str("namespace"),
            SchemaObject::Table => f.write_str("table"),
        }
    }
}

/// Errors from the observation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store configuration: {0}")]
    Configuration(String),
    #[error("could not connect to the backing store: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to create {object}: {source}")]
    Schema {
        object: SchemaObject,
        #[source]
        source: sqlx::Error,
    },
    #[error("transaction failed at {stage}: {source}")]
    Transaction {
        stage: TxStage,
        #[source]
        source: sqlx::Error,
    },
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("observation {0} not found")]
    NotFound(i64),
    #[error("could not decode observation row: {0}")]
    Scan(#[source] sqlx::Error),
    #[error("observation conflicts with an existing row ({constraint})")]
    Conflict { constraint: String },
    #[error("invalid argument: {0}")]
    InvalidInput(String),
    #[error("operation exceeded its deadline")]
    DeadlineExceeded,
    #[error("operation was cancelled")]
    Cancelled,
}

/// Coarse failure category, stable enough to map onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transaction,
    NotFound,
    Scan,
    ConstraintViolation,
    InvalidInput,
    Timeout,
    Cancelled,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Configuration(_) | StoreError::Connect(_) => ErrorKind::Configuration,
            StoreError::Schema { .. } | StoreError::Transaction { .. } | StoreError::Query(_) => {
                ErrorKind::Transaction
            }
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Scan(_) => ErrorKind::Scan,
            StoreError::Conflict { .. } => ErrorKind::ConstraintViolation,
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::DeadlineExceeded => ErrorKind::Timeout,
            StoreError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether running the same operation again could succeed without
    /// repeating a side effect that may already have landed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transaction { stage, source } => {
                is_retryable_conflict(source) || (*stage == TxStage::Begin && is_transient(source))
            }
            StoreError::Query(source) => is_retryable_conflict(source) || is_transient(source),
            _ => false,
        }
    }

    /// Classify a driver error raised while running a transactional statement.
    pub(crate) fn from_tx(stage: TxStage, err: sqlx::Error) -> Self {
        if let Some(constraint) = unique_violation(&err) {
            return StoreError::Conflict { constraint };
        }
        StoreError::Transaction { stage, source: err }
    }

    /// Classify a driver error raised by a read.
    pub(crate) fn from_read(err: sqlx::Error) -> Self {
        if is_decode_failure(&err) {
            StoreError::Scan(err)
        } else {
            StoreError::Query(err)
        }
    }
}

/// The violated constraint's name when `err` is a unique violation.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    let db = err.as_database_error()?;
    if db.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return None;
    }
    Some(db.constraint().unwrap_or("unique").to_string())
}

/// Whether `err` reports that the table being created already exists.
pub(crate) fn is_duplicate_table(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == DUPLICATE_TABLE)
}

fn is_retryable_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| is_retryable_sqlstate(&code))
}

fn is_retryable_sqlstate(code: &str) -> bool {
    code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
}

fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
}

fn is_decode_failure(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> sqlx::Error {
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(StoreError::NotFound(3).kind(), ErrorKind::NotFound);
        assert_eq!(
            StoreError::Conflict {
                constraint: "primary".into()
            }
            .kind(),
            ErrorKind::ConstraintViolation
        );
        assert_eq!(
            StoreError::Configuration("bad url".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            StoreError::Connect(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            StoreError::Transaction {
                stage: TxStage::Commit,
                source: io_error()
            }
            .kind(),
            ErrorKind::Transaction
        );
        assert_eq!(
            StoreError::Scan(sqlx::Error::ColumnNotFound("uuid".into())).kind(),
            ErrorKind::Scan
        );
        assert_eq!(
            StoreError::InvalidInput("year".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(StoreError::DeadlineExceeded.kind(), ErrorKind::Timeout);
        assert_eq!(StoreError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn begin_stage_transients_are_retryable() {
        let err = StoreError::from_tx(TxStage::Begin, sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
        let err = StoreError::from_tx(TxStage::Begin, io_error());
        assert!(err.is_retryable());
    }

    #[test]
    fn commit_stage_io_is_not_retried() {
        let err = StoreError::from_tx(TxStage::Commit, io_error());
        assert!(!err.is_retryable(), "commit may have landed");
        let err = StoreError::from_tx(TxStage::Execute, io_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn read_failures_classify_by_cause() {
        assert!(matches!(
            StoreError::from_read(sqlx::Error::ColumnNotFound("observed_on".into())),
            StoreError::Scan(_)
        ));
        let transient = StoreError::from_read(io_error());
        assert!(matches!(transient, StoreError::Query(_)));
        assert!(transient.is_retryable());
        assert!(!StoreError::from_read(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn only_database_errors_report_an_existing_table() {
        assert!(!is_duplicate_table(&sqlx::Error::RowNotFound));
        assert!(!is_duplicate_table(&io_error()));
    }

    #[test]
    fn outcome_errors_are_never_retried() {
        assert!(!StoreError::NotFound(1).is_retryable());
        assert!(!StoreError::Conflict {
            constraint: "observations_uuid_key".into()
        }
        .is_retryable());
        assert!(!StoreError::Scan(sqlx::Error::ColumnNotFound("id".into())).is_retryable());
        assert!(!StoreError::DeadlineExceeded.is_retryable());
        assert!(!StoreError::Cancelled.is_retryable());
    }

    #[test]
    fn retryable_sqlstates() {
        assert!(is_retryable_sqlstate("40001"));
        assert!(is_retryable_sqlstate("40P01"));
        assert!(!is_retryable_sqlstate(UNIQUE_VIOLATION));
        assert!(!is_retryable_sqlstate("42P01"));
    }

    #[test]
    fn messages_name_the_stage() {
        let err = StoreError::from_tx(TxStage::Commit, sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("transaction failed at commit"));
        let err = StoreError::Schema {
            object: SchemaObject::Table,
            source: sqlx::Error::PoolClosed,
        };
        assert!(err.to_string().starts_with("failed to create table"));
    }
}
