//! Scoped transactions with exactly one commit-or-rollback outcome.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::{StoreError, TxStage};

/// An open transaction on a pooled connection.
///
/// [`UnitOfWork::finish`] consumes the unit, so a transaction is committed or
/// rolled back at most once. A unit dropped without finishing (early return,
/// cancelled future) is rolled back by sqlx's drop guard before the connection
/// goes back to the pool.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    pub async fn begin(pool: &PgPool) -> Result<Self, StoreError> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| StoreError::from_tx(TxStage::Begin, e))?;
        Ok(Self { tx })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Roll back without an error to report.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::from_tx(TxStage::Commit, e))
    }

    /// Commit when `result` is `Ok`, roll back otherwise, and hand `result`
    /// back to the caller.
    pub async fn finish<T>(self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        match result {
            Ok(value) => {
                self.tx
                    .commit()
                    .await
                    .map_err(|e| StoreError::from_tx(TxStage::Commit, e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.tx.rollback().await {
                    tracing::warn!("Rollback after {} failed: {}", err, rollback_err);
                } else {
                    tracing::debug!("Rolled back after: {}", err);
                }
                Err(err)
            }
        }
    }
}
