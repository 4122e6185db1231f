use helio_store::{ErrorKind, QueryError, StoreError};

/// Error type for CLI operations.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An input or seed file could not be read or parsed.
    #[error("{0:#}")]
    Input(#[from] anyhow::Error),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// The record in an update file names a different id than the command.
    #[error("record id {body} does not match requested id {requested}")]
    IdMismatch { requested: i64, body: i64 },

    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Store(e) => match e.kind() {
                ErrorKind::NotFound => 4,
                ErrorKind::ConstraintViolation => 5,
                ErrorKind::InvalidInput => 2,
                ErrorKind::Timeout | ErrorKind::Cancelled => 6,
                ErrorKind::Configuration | ErrorKind::Transaction | ErrorKind::Scan => 1,
            },
            CliError::Input(_) | CliError::Query(_) | CliError::IdMismatch { .. } => 2,
            CliError::Output(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_error_kind() {
        assert_eq!(CliError::from(StoreError::NotFound(3)).exit_code(), 4);
        assert_eq!(
            CliError::from(StoreError::Conflict {
                constraint: "fl_lepidoptera_pkey".to_string()
            })
            .exit_code(),
            5
        );
        assert_eq!(CliError::from(StoreError::DeadlineExceeded).exit_code(), 6);
        assert_eq!(CliError::from(StoreError::Cancelled).exit_code(), 6);
        assert_eq!(
            CliError::from(StoreError::Configuration("bad".to_string())).exit_code(),
            1
        );
        assert_eq!(CliError::from(QueryError::NoCriteria).exit_code(), 2);
        assert_eq!(
            CliError::IdMismatch {
                requested: 1,
                body: 2
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_input_error_shows_the_whole_chain() {
        let err = CliError::from(anyhow::anyhow!("missing field `id`").context("failed to parse x.json"));
        assert_eq!(err.to_string(), "failed to parse x.json: missing field `id`");
    }
}
