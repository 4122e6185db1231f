//! Postgres-backed implementation of [`ObservationRepository`].
//!
//! Works against Postgres and CockroachDB alike. Every operation runs under
//! the caller's [`OpContext`] and the store's [`RetryPolicy`]; writes, schema
//! creation included, run in a [`UnitOfWork`], reads stream their rows and
//! drop the stream on every exit.

use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, PgQueryResult};
use sqlx::query::{Query, QueryAs};
use sqlx::{PgConnection, PgPool, Postgres};
use tokio_stream::StreamExt;

use crate::config::StoreConfig;
use crate::context::OpContext;
use crate::error::{is_duplicate_table, SchemaObject, StoreError, TxStage};
use crate::model::{DateRange, Observation, SchemaOutcome};
use crate::retry::RetryPolicy;
use crate::sql::{Statements, TableRef};
use crate::traits::ObservationRepository;
use crate::unit_of_work::UnitOfWork;

type ObservationQueryAs<'q> = QueryAs<'q, Postgres, Observation, PgArguments>;

/// Sole owner of the pool for the observations table. Construct one per
/// process and share it by reference.
pub struct ObservationStore {
    pool: PgPool,
    statements: Statements,
    retry: RetryPolicy,
}

impl ObservationStore {
    /// Connect eagerly; an unreachable store fails here.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let table = config.table_ref()?;
        let options = config.connect_options()?;
        let pool = config
            .pool_options()
            .connect_with(options)
            .await
            .map_err(StoreError::Connect)?;
        tracing::info!(
            "Connected to backing store, table {}",
            table.qualified()
        );
        Ok(Self::from_pool(pool, &table).with_retry(config.retry))
    }

    /// Build the pool without opening a connection; the first operation
    /// connects.
    pub fn connect_lazy(config: &StoreConfig) -> Result<Self, StoreError> {
        let table = config.table_ref()?;
        let options = config.connect_options()?;
        let pool = config.pool_options().connect_lazy_with(options);
        Ok(Self::from_pool(pool, &table).with_retry(config.retry))
    }

    pub fn from_pool(pool: PgPool, table: &TableRef) -> Self {
        Self {
            pool,
            statements: Statements::new(table),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wait for checked-out connections to come back, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Backing store pool closed");
    }

    /// Create the namespace and table, then load `seed`, in one transaction.
    /// A table that already exists means the store is provisioned: the
    /// transaction is rolled back and the seed is not attempted.
    async fn bootstrap_once(&self, seed: &[Observation]) -> Result<SchemaOutcome, StoreError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let namespace = sqlx::query(&self.statements.create_namespace)
            .execute(uow.conn())
            .await;
        if let Err(source) = namespace {
            let err = StoreError::Schema {
                object: SchemaObject::Namespace,
                source,
            };
            return uow.finish(Err(err)).await;
        }

        let table = sqlx::query(&self.statements.create_table)
            .execute(uow.conn())
            .await;
        match table {
            Ok(_) => {}
            Err(e) if is_duplicate_table(&e) => {
                uow.rollback().await?;
                tracing::info!("Table already provisioned, seed skipped");
                return Ok(SchemaOutcome::Existing);
            }
            Err(source) => {
                let err = StoreError::Schema {
                    object: SchemaObject::Table,
                    source,
                };
                return uow.finish(Err(err)).await;
            }
        }

        let result = self
            .insert_all(uow.conn(), seed)
            .await
            .map(|seeded| SchemaOutcome::Created { seeded });
        let outcome = uow.finish(result).await?;
        tracing::info!("Created table and seeded {} observations", outcome.seeded());
        Ok(outcome)
    }

    fn insert_query<'q>(&'q self, o: &'q Observation) -> Query<'q, Postgres, PgArguments> {
        sqlx::query(&self.statements.insert)
            .bind(o.id)
            .bind(o.taxon_id)
            .bind(o.uuid)
            .bind(&o.place_guess)
            .bind(&o.species_guess)
            .bind(&o.latitude)
            .bind(&o.longitude)
            .bind(o.observed_on)
            .bind(&o.time_zone)
    }

    async fn insert_all(
        &self,
        conn: &mut PgConnection,
        observations: &[Observation],
    ) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for observation in observations {
            self.insert_query(observation)
                .execute(&mut *conn)
                .await
                .map_err(|e| StoreError::from_tx(TxStage::Execute, e))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_many_once(&self, observations: &[Observation]) -> Result<u64, StoreError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let result = self.insert_all(uow.conn(), observations).await;
        uow.finish(result).await
    }

    async fn update_once(&self, id: i64, o: &Observation) -> Result<(), StoreError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let result = sqlx::query(&self.statements.update_by_id)
            .bind(&o.place_guess)
            .bind(&o.species_guess)
            .bind(&o.latitude)
            .bind(&o.longitude)
            .bind(o.observed_on)
            .bind(&o.time_zone)
            .bind(id)
            .execute(uow.conn())
            .await;
        let result = expect_row(result, id);
        uow.finish(result).await
    }

    async fn delete_once(&self, id: i64) -> Result<(), StoreError> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let result = sqlx::query(&self.statements.delete_by_id)
            .bind(id)
            .execute(uow.conn())
            .await;
        let result = expect_row(result, id);
        uow.finish(result).await
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Observation, StoreError> {
        sqlx::query_as::<_, Observation>(&self.statements.select_by_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_read)?
            .ok_or(StoreError::NotFound(id))
    }

    /// Stream every row of `query`. The stream, and with it the pooled
    /// connection, is released on the first failure.
    async fn collect(&self, query: ObservationQueryAs<'_>) -> Result<Vec<Observation>, StoreError> {
        let mut rows = query.fetch(&self.pool);
        let mut observations = Vec::new();
        while let Some(row) = rows.next().await {
            observations.push(row.map_err(StoreError::from_read)?);
        }
        Ok(observations)
    }

    async fn fetch_in_range(&self, range: DateRange) -> Result<Vec<Observation>, StoreError> {
        let query = sqlx::query_as(&self.statements.select_in_range)
            .bind(range.lower())
            .bind(range.upper());
        self.collect(query).await
    }
}

/// Map an id-scoped write onto not-found when it touched no row.
fn expect_row(result: Result<PgQueryResult, sqlx::Error>, id: i64) -> Result<(), StoreError> {
    let done = result.map_err(|e| StoreError::from_tx(TxStage::Execute, e))?;
    if done.rows_affected() == 0 {
        Err(StoreError::NotFound(id))
    } else {
        Ok(())
    }
}

fn year_range(year: i32) -> Result<DateRange, StoreError> {
    DateRange::year(year)
        .ok_or_else(|| StoreError::InvalidInput(format!("year {year} is out of range")))
}

impl ObservationRepository for ObservationStore {
    #[tracing::instrument(level = "info", skip_all, fields(seed = seed.len()))]
    async fn ensure_schema(
        &self,
        ctx: &OpContext,
        seed: &[Observation],
    ) -> Result<SchemaOutcome, StoreError> {
        ctx.run(
            self.retry
                .run("ensure_schema", move || self.bootstrap_once(seed)),
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(id = observation.id))]
    async fn insert(&self, ctx: &OpContext, observation: &Observation) -> Result<(), StoreError> {
        ctx.run(self.retry.run("insert", move || async move {
            self.insert_many_once(std::slice::from_ref(observation))
                .await
                .map(|_| ())
        }))
        .await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(count = observations.len()))]
    async fn insert_many(
        &self,
        ctx: &OpContext,
        observations: &[Observation],
    ) -> Result<u64, StoreError> {
        ctx.run(
            self.retry
                .run("insert_many", move || self.insert_many_once(observations)),
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn get_by_id(&self, ctx: &OpContext, id: i64) -> Result<Observation, StoreError> {
        ctx.run(self.retry.run("get_by_id", move || self.fetch_by_id(id)))
            .await
    }

    #[tracing::instrument(level = "debug", skip_all)]
    async fn list_all(&self, ctx: &OpContext) -> Result<Vec<Observation>, StoreError> {
        ctx.run(self.retry.run("list_all", move || {
            self.collect(sqlx::query_as(&self.statements.select_all))
        }))
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx, observation))]
    async fn update_by_id(
        &self,
        ctx: &OpContext,
        id: i64,
        observation: &Observation,
    ) -> Result<(), StoreError> {
        ctx.run(
            self.retry
                .run("update_by_id", move || self.update_once(id, observation)),
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn delete_by_id(&self, ctx: &OpContext, id: i64) -> Result<(), StoreError> {
        ctx.run(self.retry.run("delete_by_id", move || self.delete_once(id)))
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn find_by_taxon(
        &self,
        ctx: &OpContext,
        taxon_id: i64,
    ) -> Result<Vec<Observation>, StoreError> {
        ctx.run(self.retry.run("find_by_taxon", move || {
            self.collect(sqlx::query_as(&self.statements.select_by_taxon).bind(taxon_id))
        }))
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn find_in_range(
        &self,
        ctx: &OpContext,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Vec<Observation>, StoreError> {
        let range = DateRange::new(date1, date2);
        ctx.run(
            self.retry
                .run("find_in_range", move || self.fetch_in_range(range)),
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn find_by_taxon_in_range(
        &self,
        ctx: &OpContext,
        taxon_id: i64,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> Result<Vec<Observation>, StoreError> {
        let range = DateRange::new(date1, date2);
        ctx.run(self.retry.run("find_by_taxon_in_range", move || {
            self.collect(
                sqlx::query_as(&self.statements.select_by_taxon_in_range)
                    .bind(taxon_id)
                    .bind(range.lower())
                    .bind(range.upper()),
            )
        }))
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn find_in_year(
        &self,
        ctx: &OpContext,
        year: i32,
    ) -> Result<Vec<Observation>, StoreError> {
        let range = year_range(year)?;
        ctx.run(
            self.retry
                .run("find_in_year", move || self.fetch_in_range(range)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    /// A store whose pool points at a port nothing listens on.
    fn unreachable_store() -> ObservationStore {
        let config = StoreConfig {
            database_url: "postgres://helio@127.0.0.1:1/helio?sslmode=disable".to_string(),
            acquire_timeout: Duration::from_millis(500),
            retry: RetryPolicy::none(),
            ..Default::default()
        };
        ObservationStore::connect_lazy(&config).unwrap()
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url_before_dialing() {
        let config = StoreConfig {
            database_url: "::not-a-url::".to_string(),
            ..Default::default()
        };
        let err = ObservationStore::connect(&config).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn connect_to_unreachable_store_is_a_configuration_failure() {
        let config = StoreConfig {
            database_url: "postgres://helio@127.0.0.1:1/helio?sslmode=disable".to_string(),
            acquire_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let err = ObservationStore::connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Connect(_)), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn finder_reports_store_failure_instead_of_empty_result() {
        let store = unreachable_store();
        let result = store.find_by_taxon(&OpContext::background(), 99).await;
        let err = result.expect_err("store failure must not look like an empty result");
        assert_eq!(err.kind(), ErrorKind::Transaction);
    }

    #[tokio::test]
    async fn get_by_id_keeps_store_failure_apart_from_not_found() {
        let store = unreachable_store();
        let err = store
            .get_by_id(&OpContext::background(), 1)
            .await
            .unwrap_err();
        assert_ne!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn write_without_a_connection_fails_at_begin() {
        let store = unreachable_store();
        let err = store
            .delete_by_id(&OpContext::background(), 1)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                StoreError::Transaction {
                    stage: TxStage::Begin,
                    ..
                }
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn bootstrap_without_a_connection_creates_nothing() {
        let store = unreachable_store();
        let seed = [Observation {
            id: 1,
            taxon_id: 42,
            uuid: uuid::Uuid::new_v4(),
            place_guess: "Gainesville, FL".to_string(),
            species_guess: "Monarch".to_string(),
            latitude: "29.65".to_string(),
            longitude: "-82.32".to_string(),
            observed_on: NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
            time_zone: "Eastern Time (US & Canada)".to_string(),
        }];
        let err = store
            .ensure_schema(&OpContext::background(), &seed)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                StoreError::Transaction {
                    stage: TxStage::Begin,
                    ..
                }
            ),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn cancelled_context_never_reaches_the_store() {
        let store = unreachable_store();
        let (ctx, handle) = OpContext::background().cancellable();
        handle.cancel();
        let err = store.list_all(&ctx).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }

    #[tokio::test]
    async fn year_outside_the_calendar_is_invalid_input() {
        let store = unreachable_store();
        let err = store
            .find_in_year(&OpContext::background(), i32::MIN)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_affected_rows_is_not_found() {
        let result = expect_row(Ok(PgQueryResult::default()), 12);
        assert!(matches!(result, Err(StoreError::NotFound(12))));
    }
}
