//! SQLite-backed persistence for placemarks, annotations and collections.
//!
//! The [`DatabaseHandle`] owns the lifecycle of one database file. The DAO
//! modules are free functions over a borrowed [`rusqlite::Connection`], so
//! callers decide the transaction boundaries.

use std::path::PathBuf;

use rusqlite::Error as SqliteError;
use thiserror::Error;

use crate::{CollectionError, CollectionId, Coordinates, PlacemarkId};

pub mod annotations;
pub mod collections;
mod database;
pub mod placemarks;
mod schema;
mod search;

pub use database::{DatabaseHandle, LockedDatabase, OpenDatabase};
pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};
pub use search::{
    BoundingBox, DEFAULT_RESULT_CAP, LongitudeRange, ProximityQuery, SearchError, SearchHit,
    search,
};

/// Errors raised by the store and its DAOs.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    OpenDatabase {
        /// Location of the database file.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Initialising the schema failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A statement failed.
    #[error("failed to {operation}")]
    Sqlite {
        /// Operation being performed.
        operation: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A uniqueness constraint rejected the write.
    #[error("duplicate {what} rejected by the store")]
    Duplicate {
        /// Kind of record that collided.
        what: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A placemark failed validation before it reached the store.
    #[error("placemark {name:?} has coordinates outside the valid range")]
    InvalidPlacemark {
        /// Name of the rejected placemark.
        name: String,
    },
    /// An annotation was keyed on a position that cannot be stored.
    #[error("annotation position {coordinates} is not a valid location")]
    InvalidAnnotation {
        /// Rejected key.
        coordinates: Coordinates,
    },
    /// A collection failed validation before it reached the store.
    #[error(transparent)]
    InvalidCollection(#[from] CollectionError),
    /// No placemark exists with the given id.
    #[error("placemark {id} does not exist")]
    MissingPlacemark {
        /// Identifier that was looked up.
        id: PlacemarkId,
    },
    /// No collection exists with the given id.
    #[error("collection {id} does not exist")]
    MissingCollection {
        /// Identifier that was looked up.
        id: CollectionId,
    },
}

impl StoreError {
    /// Wrap a `rusqlite` error, classifying uniqueness violations.
    pub(crate) fn classify(
        operation: &'static str,
        what: &'static str,
        source: SqliteError,
    ) -> Self {
        if is_constraint_violation(&source) {
            Self::Duplicate { what, source }
        } else {
            Self::Sqlite { operation, source }
        }
    }

    /// Report whether the error is a tolerated duplicate-key rejection.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

pub(crate) fn sqlite(operation: &'static str) -> impl FnOnce(SqliteError) -> StoreError {
    move |source| StoreError::Sqlite { operation, source }
}

fn is_constraint_violation(error: &SqliteError) -> bool {
    matches!(
        error,
        SqliteError::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
