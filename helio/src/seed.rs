//! JSON fixture loading.
//!
//! Seed files hold an array of observation drafts; single-record input files
//! hold one draft. Drafts without a `uuid` get a fresh one on conversion.

use std::path::Path;

use anyhow::Context;
use helio_store::{Observation, ObservationDraft};
use serde::de::DeserializeOwned;

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load every record in the seed fixture at `path`.
pub fn load_seed(path: &Path) -> anyhow::Result<Vec<Observation>> {
    let drafts: Vec<ObservationDraft> = read_json(path)?;
    tracing::debug!("Loaded {} seed records from {}", drafts.len(), path.display());
    Ok(drafts
        .into_iter()
        .map(ObservationDraft::into_observation)
        .collect())
}

pub fn load_draft(path: &Path) -> anyhow::Result<ObservationDraft> {
    read_json(path)
}
