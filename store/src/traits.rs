//! Async repository seam for observation persistence.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send` and can be driven from `tokio::spawn`.

use std::future::Future;

use chrono::NaiveDate;

use crate::context::OpContext;
use crate::error::StoreError;
use crate::model::{Observation, SchemaOutcome, SearchPlan};

/// Everything a caller can do with the observations table.
///
/// Id-scoped reads, updates and deletes report a missing row as
/// [`StoreError::NotFound`]; finders report "no matches" as an empty vector
/// and reserve `Err` for store failures.
pub trait ObservationRepository: Send + Sync {
    /// Create the namespace and table, then load `seed`, all in one
    /// transaction. An already provisioned table is reported as
    /// [`SchemaOutcome::Existing`] and the seed is not attempted, so rows
    /// deleted since the first bootstrap stay deleted.
    fn ensure_schema(
        &self,
        ctx: &OpContext,
        seed: &[Observation],
    ) -> impl Future<Output = Result<SchemaOutcome, StoreError>> + Send;

    fn insert(
        &self,
        ctx: &OpContext,
        observation: &Observation,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All-or-nothing batch insert.
    fn insert_many(
        &self,
        ctx: &OpContext,
        observations: &[Observation],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    fn get_by_id(
        &self,
        ctx: &OpContext,
        id: i64,
    ) -> impl Future<Output = Result<Observation, StoreError>> + Send;

    fn list_all(
        &self,
        ctx: &OpContext,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send;

    /// Rewrite every mutable field of row `id`. `taxon_id` and `uuid` in
    /// `observation` are ignored.
    fn update_by_id(
        &self,
        ctx: &OpContext,
        id: i64,
        observation: &Observation,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_by_id(
        &self,
        ctx: &OpContext,
        id: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn find_by_taxon(
        &self,
        ctx: &OpContext,
        taxon_id: i64,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send;

    /// Observations dated within `[min(date1, date2), max(date1, date2)]`.
    fn find_in_range(
        &self,
        ctx: &OpContext,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send;

    fn find_by_taxon_in_range(
        &self,
        ctx: &OpContext,
        taxon_id: i64,
        date1: NaiveDate,
        date2: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send;

    fn find_in_year(
        &self,
        ctx: &OpContext,
        year: i32,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send;

    /// Dispatch a planned search to the matching finder.
    fn search(
        &self,
        ctx: &OpContext,
        plan: SearchPlan,
    ) -> impl Future<Output = Result<Vec<Observation>, StoreError>> + Send {
        async move {
            match plan {
                SearchPlan::Taxon(taxon) => self.find_by_taxon(ctx, taxon).await,
                SearchPlan::InRange(range) => {
                    self.find_in_range(ctx, range.lower(), range.upper()).await
                }
                SearchPlan::TaxonInRange(taxon, range) => {
                    self.find_by_taxon_in_range(ctx, taxon, range.lower(), range.upper())
                        .await
                }
            }
        }
    }
}
