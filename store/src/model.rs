//! Observation records and the search criteria callers build against them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One butterfly sighting, exactly as stored in the observations table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Observation {
    pub id: i64,
    pub taxon_id: i64,
    pub uuid: Uuid,
    pub place_guess: String,
    pub species_guess: String,
    pub latitude: String,
    pub longitude: String,
    pub observed_on: NaiveDate,
    pub time_zone: String,
}

/// An observation as submitted for creation. The identifier is chosen by the
/// caller; the UUID may be left out and is generated on conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationDraft {
    pub id: i64,
    pub taxon_id: i64,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    pub place_guess: String,
    pub species_guess: String,
    pub latitude: String,
    pub longitude: String,
    pub observed_on: NaiveDate,
    pub time_zone: String,
}

impl ObservationDraft {
    pub fn into_observation(self) -> Observation {
        Observation {
            id: self.id,
            taxon_id: self.taxon_id,
            uuid: self.uuid.unwrap_or_else(Uuid::new_v4),
            place_guess: self.place_guess,
            species_guess: self.species_guess,
            latitude: self.latitude,
            longitude: self.longitude,
            observed_on: self.observed_on,
            time_zone: self.time_zone,
        }
    }
}

/// What a schema bootstrap found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum SchemaOutcome {
    /// The table was created by this call and `seeded` rows were loaded.
    Created { seeded: u64 },
    /// The table was already provisioned; the seed was not attempted.
    Existing,
}

impl SchemaOutcome {
    pub fn seeded(&self) -> u64 {
        match self {
            SchemaOutcome::Created { seeded } => *seeded,
            SchemaOutcome::Existing => 0,
        }
    }
}

/// Inclusive calendar-date interval. The endpoints are ordered on
/// construction, so a swapped pair describes the same range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    lower: NaiveDate,
    upper: NaiveDate,
}

impl DateRange {
    pub fn new(date1: NaiveDate, date2: NaiveDate) -> Self {
        if date1 > date2 {
            Self {
                lower: date2,
                upper: date1,
            }
        } else {
            Self {
                lower: date1,
                upper: date2,
            }
        }
    }

    /// January 1st through December 31st of `year`, or `None` when the year
    /// is outside chrono's representable range.
    pub fn year(year: i32) -> Option<Self> {
        let lower = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let upper = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self { lower, upper })
    }

    pub fn lower(&self) -> NaiveDate {
        self.lower
    }

    pub fn upper(&self) -> NaiveDate {
        self.upper
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.lower <= date && date <= self.upper
    }
}

/// Raw search criteria as a caller received them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationQuery {
    #[serde(default)]
    pub taxon_id: Option<i64>,
    #[serde(default)]
    pub date1: Option<NaiveDate>,
    #[serde(default)]
    pub date2: Option<NaiveDate>,
}

/// The finder a query resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPlan {
    Taxon(i64),
    InRange(DateRange),
    TaxonInRange(i64, DateRange),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("search needs a taxon id, a pair of dates, or both")]
    NoCriteria,
}

impl ObservationQuery {
    /// Taxon id with `0` treated as "no filter".
    pub fn taxon(&self) -> Option<i64> {
        self.taxon_id.filter(|taxon| *taxon != 0)
    }

    /// Both dates as a normalized range. A lone date is ignored.
    pub fn range(&self) -> Option<DateRange> {
        match (self.date1, self.date2) {
            (Some(date1), Some(date2)) => Some(DateRange::new(date1, date2)),
            _ => None,
        }
    }

    pub fn plan(&self) -> Result<SearchPlan, QueryError> {
        match (self.taxon(), self.range()) {
            (Some(taxon), Some(range)) => Ok(SearchPlan::TaxonInRange(taxon, range)),
            (None, Some(range)) => Ok(SearchPlan::InRange(range)),
            (Some(taxon), None) => Ok(SearchPlan::Taxon(taxon)),
            (None, None) => Err(QueryError::NoCriteria),
        }
    }
}
