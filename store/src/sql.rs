//! SQL text for every statement the store runs.
//!
//! Namespace and table names are the only values interpolated into SQL, and
//! only after [`TableRef::new`] has accepted them as plain identifiers. All
//! record values travel as positional parameters.

use crate::error::StoreError;

/// Longest identifier Postgres keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

const COLUMNS: &str =
    "id, taxon_id, uuid, place_guess, species_guess, latitude, longitude, observed_on, time_zone";

/// A validated `namespace.table` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    namespace: String,
    table: String,
}

impl TableRef {
    pub fn new(namespace: &str, table: &str) -> Result<Self, StoreError> {
        validate_identifier(namespace)?;
        validate_identifier(table)?;
        Ok(Self {
            namespace: namespace.to_string(),
            table: table.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace, self.table)
    }
}

fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if starts_well && rest_ok && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(StoreError::Configuration(format!(
            "'{name}' is not a valid SQL identifier"
        )))
    }
}

/// Statements prepared once per store against a [`TableRef`].
#[derive(Debug, Clone)]
pub struct Statements {
    pub create_namespace: String,
    /// Fails with `duplicate_table` when the table exists. The seed loads only
    /// when this statement succeeds.
    pub create_table: String,
    pub insert: String,
    pub select_by_id: String,
    pub select_all: String,
    pub select_by_taxon: String,
    pub select_in_range: String,
    pub select_by_taxon_in_range: String,
    pub update_by_id: String,
    pub delete_by_id: String,
}

impl Statements {
    pub fn new(table: &TableRef) -> Self {
        let name = table.qualified();
        let select = format!("SELECT {COLUMNS} FROM {name}");
        Self {
            create_namespace: format!("CREATE SCHEMA IF NOT EXISTS {}", table.namespace()),
            create_table: format!(
                "CREATE TABLE {name} (\
                 id INT8 PRIMARY KEY NOT NULL, \
                 taxon_id INT8 NOT NULL, \
                 uuid UUID UNIQUE NOT NULL, \
                 place_guess TEXT NOT NULL, \
                 species_guess TEXT NOT NULL, \
                 latitude TEXT NOT NULL, \
                 longitude TEXT NOT NULL, \
                 observed_on DATE NOT NULL, \
                 time_zone TEXT NOT NULL)"
            ),
            insert: format!(
                "INSERT INTO {name} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ),
            select_by_id: format!("{select} WHERE id = $1"),
            select_all: select.clone(),
            select_by_taxon: format!("{select} WHERE taxon_id = $1"),
            select_in_range: format!("{select} WHERE observed_on BETWEEN $1 AND $2"),
            select_by_taxon_in_range: format!(
                "{select} WHERE taxon_id = $1 AND observed_on BETWEEN $2 AND $3"
            ),
            update_by_id: format!(
                "UPDATE {name} SET place_guess = $1, species_guess = $2, latitude = $3, \
                 longitude = $4, observed_on = $5, time_zone = $6 WHERE id = $7"
            ),
            delete_by_id: format!("DELETE FROM {name} WHERE id = $1"),
        }
    }
}
