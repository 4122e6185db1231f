//! Subcommand dispatch against any [`ObservationRepository`].
//!
//! Results are written as pretty-printed JSON to the supplied writer so the
//! dispatch can be exercised without a terminal or a database.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Subcommand;
use helio_store::{ObservationQuery, ObservationRepository, OpContext, SchemaOutcome};
use serde::Serialize;

use crate::error::CliError;
use crate::seed;

/// One store operation per subcommand.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the namespace and table, then load the seed fixture.
    Bootstrap {
        /// Seed fixture to load. Defaults to `HELIO_SEED_PATH`.
        #[arg(long)]
        seed: Option<PathBuf>,
    },
    /// Insert one observation read from a JSON file.
    Insert {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print one observation.
    Get { id: i64 },
    /// Print every observation.
    List,
    /// Replace the mutable fields of an observation from a JSON file.
    ///
    /// The file's `id` must match ID. `taxon_id` and `uuid` are never changed.
    Update {
        id: i64,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete one observation.
    Delete { id: i64 },
    /// Search by taxon, by an inclusive date range, or both.
    ///
    /// A lone date without its partner is ignored, as is a taxon id of 0.
    Search {
        #[arg(long)]
        taxon: Option<i64>,
        #[arg(long)]
        date1: Option<NaiveDate>,
        #[arg(long)]
        date2: Option<NaiveDate>,
    },
    /// Print every observation from one calendar year.
    Year { year: i32 },
}

fn print_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out).map_err(serde_json::Error::io)?;
    Ok(())
}

/// Create the schema and load the seed at `seed_path`. The seed is loaded
/// only into a table this call created.
pub async fn bootstrap<R: ObservationRepository>(
    repo: &R,
    ctx: &OpContext,
    seed_path: &Path,
) -> Result<SchemaOutcome, CliError> {
    let seed = seed::load_seed(seed_path)?;
    Ok(repo.ensure_schema(ctx, &seed).await?)
}

/// Startup bootstrap that never aborts the process.
///
/// An unreadable seed file still lets the schema be created. Once the table
/// exists the seed is never loaded again, so deleted rows stay deleted.
pub async fn bootstrap_tolerant<R: ObservationRepository>(
    repo: &R,
    ctx: &OpContext,
    seed_path: &Path,
) {
    let seed = match seed::load_seed(seed_path) {
        Ok(seed) => seed,
        Err(e) => {
            tracing::warn!("Skipping seed load: {:#}", e);
            Vec::new()
        }
    };
    match repo.ensure_schema(ctx, &seed).await {
        Ok(SchemaOutcome::Existing) => tracing::debug!("Schema already provisioned"),
        Ok(SchemaOutcome::Created { seeded }) => {
            tracing::info!("Created schema, seeded {} observations", seeded)
        }
        Err(e) => tracing::warn!("Bootstrap failed, continuing: {}", e),
    }
}

/// Run `command` and write its result to `out`.
pub async fn execute<R: ObservationRepository>(
    repo: &R,
    ctx: &OpContext,
    command: Command,
    default_seed: &Path,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Bootstrap { seed } => {
            let path = seed.as_deref().unwrap_or(default_seed);
            let outcome = bootstrap(repo, ctx, path).await?;
            print_json(out, &outcome)
        }
        Command::Insert { file } => {
            let observation = seed::load_draft(&file)?.into_observation();
            repo.insert(ctx, &observation).await?;
            print_json(out, &observation)
        }
        Command::Get { id } => {
            let observation = repo.get_by_id(ctx, id).await?;
            print_json(out, &observation)
        }
        Command::List => {
            let observations = repo.list_all(ctx).await?;
            print_json(out, &observations)
        }
        Command::Update { id, file } => {
            let draft = seed::load_draft(&file)?;
            if draft.id != id {
                return Err(CliError::IdMismatch {
                    requested: id,
                    body: draft.id,
                });
            }
            repo.update_by_id(ctx, id, &draft.into_observation())
                .await?;
            let updated = repo.get_by_id(ctx, id).await?;
            print_json(out, &updated)
        }
        Command::Delete { id } => {
            repo.delete_by_id(ctx, id).await?;
            print_json(out, &serde_json::json!({ "deleted": id }))
        }
        Command::Search {
            taxon,
            date1,
            date2,
        } => {
            let plan = ObservationQuery {
                taxon_id: taxon,
                date1,
                date2,
            }
            .plan()?;
            let observations = repo.search(ctx, plan).await?;
            print_json(out, &observations)
        }
        Command::Year { year } => {
            let observations = repo.find_in_year(ctx, year).await?;
            print_json(out, &observations)
        }
    }
}
