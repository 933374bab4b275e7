//! Schema creation and version checks for the placemark database.
//!
//! Three tables hold placemarks, annotations and collections. The schema
//! version lives in `PRAGMA user_version`.

use rusqlite::{Connection, Error as SqliteError, Transaction};
use thiserror::Error;

/// Version recorded in `PRAGMA user_version` by [`initialise_schema`].
pub const SCHEMA_VERSION: i64 = 1;

/// Errors raised when initialising the placemark schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A DDL statement failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Description of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was written by an incompatible schema.
    #[error("expected placemark schema version {expected} but found {found}")]
    VersionMismatch {
        /// Version understood by this build.
        expected: i64,
        /// Version stored in the file.
        found: i64,
    },
}

/// Create the placemark, annotation and collection tables if missing.
///
/// Coordinates are stored as `round(degrees * 2^20)` integers. Cascading
/// deletes from collections to placemarks are performed by the DAOs rather
/// than by foreign keys.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use placemark_core::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create schema");
/// let tables: i64 = conn
///     .query_row(
///         "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
///             AND name IN ('placemark', 'placemark_annotation', 'placemark_collection')",
///         [],
///         |row| row.get(0),
///     )
///     .expect("count tables");
/// assert_eq!(tables, 3);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    let found: i64 = transaction
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;
    match found {
        0 => {
            create_tables(&transaction)?;
            transaction
                .pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|source| SchemaError::Migration {
                    step: "record schema version",
                    source,
                })?;
        }
        version if version == SCHEMA_VERSION => {}
        found => {
            return Err(SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
    }

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create placemark",
        "CREATE TABLE IF NOT EXISTS placemark (
            _id INTEGER PRIMARY KEY AUTOINCREMENT,
            latitude INTEGER NOT NULL,
            longitude INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            collection_id INTEGER NOT NULL,
            UNIQUE (collection_id, latitude, longitude)
        )",
    )?;
    run_migration_step(
        transaction,
        "index placemark coordinates",
        "CREATE INDEX IF NOT EXISTS idx_placemark_coordinates
            ON placemark(latitude, longitude)",
    )?;
    run_migration_step(
        transaction,
        "create placemark_annotation",
        "CREATE TABLE IF NOT EXISTS placemark_annotation (
            _id INTEGER PRIMARY KEY AUTOINCREMENT,
            latitude INTEGER NOT NULL,
            longitude INTEGER NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            flag INTEGER NOT NULL DEFAULT 0,
            UNIQUE (latitude, longitude)
        )",
    )?;
    run_migration_step(
        transaction,
        "create placemark_collection",
        "CREATE TABLE IF NOT EXISTS placemark_collection (
            _id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            source TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            last_update INTEGER NOT NULL DEFAULT 0,
            poi_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE (category, name)
        )",
    )
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        Connection::open_in_memory().expect("open in-memory database")
    }

    #[rstest]
    fn records_schema_version(mut connection: Connection) {
        initialise_schema(&mut connection).expect("initialise schema");
        let version: i64 = connection
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("read version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[rstest]
    fn creates_the_three_tables(mut connection: Connection) {
        initialise_schema(&mut connection).expect("initialise schema");
        let mut statement = connection
            .prepare("SELECT name FROM sqlite_master
                    WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .expect("prepare table listing");
        let tables: Vec<String> = statement
            .query_map([], |row| row.get(0))
            .expect("list tables")
            .collect::<Result<_, _>>()
            .expect("read table names");
        assert_eq!(
            tables,
            ["placemark", "placemark_annotation", "placemark_collection"]
        );
    }

    #[rstest]
    fn initialisation_is_idempotent(mut connection: Connection) {
        initialise_schema(&mut connection).expect("first run");
        initialise_schema(&mut connection).expect("second run");
    }

    #[rstest]
    fn rejects_newer_schema(mut connection: Connection) {
        connection
            .pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .expect("bump version");
        let err = initialise_schema(&mut connection).expect_err("mismatch should fail");
        assert!(matches!(
            err,
            SchemaError::VersionMismatch { found, .. } if found == SCHEMA_VERSION + 1
        ));
    }
}
