//! Persistence for butterfly observation records.
//!
//! ## Overview
//!
//! [`ObservationStore`] owns a `sqlx::PgPool` against a Postgres-compatible
//! database (CockroachDB in the reference deployment) and implements the
//! [`ObservationRepository`] trait:
//!
//! | Operation | Shape |
//! |-----------|-------|
//! | `ensure_schema` | create namespace and table and load seed records in one transaction; an existing table skips the seed |
//! | `insert` / `insert_many` | transactional, duplicate `id`/`uuid` → [`StoreError::Conflict`] |
//! | `get_by_id` | one row or [`StoreError::NotFound`] |
//! | `list_all` | every row, unspecified order |
//! | `update_by_id` / `delete_by_id` | transactional, zero rows → [`StoreError::NotFound`] |
//! | `find_by_taxon`, `find_in_range`, `find_by_taxon_in_range`, `find_in_year` | filtered reads, empty vector when nothing matches |
//!
//! Date ranges are inclusive and order-insensitive: a swapped pair is
//! normalized by [`DateRange::new`] before it reaches SQL.
//!
//! ## Transactions, deadlines and retries
//!
//! Writes run in a [`UnitOfWork`], which commits or rolls back exactly once
//! and rolls back on drop. Every call takes an [`OpContext`] carrying an
//! optional deadline and cancel signal. Transient failures are retried by the
//! store's [`RetryPolicy`]; not-found and constraint violations never are.
//!
//! ## Tests
//!
//! Unit tests need no database. The tests in `integration_tests` run against a
//! live Postgres or CockroachDB and are ignored by default:
//!
//! ```text
//! HELIO_TEST_DATABASE_URL=postgres://postgres@localhost:5432/postgres \
//!     cargo test -p helio-store -- --ignored
//! ```
//!
//! Each test creates and drops its own namespace.

mod config;
mod context;
mod error;
mod model;
mod retry;
mod sql;
mod store;
mod traits;
mod unit_of_work;

pub use config::{
    StoreConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_APPLICATION_NAME, DEFAULT_DATABASE_URL,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_NAMESPACE, DEFAULT_STATEMENT_TIMEOUT, DEFAULT_TABLE,
};
pub use context::{CancelHandle, OpContext};
pub use error::{ErrorKind, SchemaObject, StoreError, TxStage};
pub use model::{
    DateRange, Observation, ObservationDraft, ObservationQuery, QueryError, SchemaOutcome,
    SearchPlan,
};
pub use retry::RetryPolicy;
pub use sql::{Statements, TableRef};
pub use store::ObservationStore;
pub use traits::ObservationRepository;
pub use unit_of_work::UnitOfWork;
