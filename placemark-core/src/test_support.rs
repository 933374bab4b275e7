//! Fixtures shared by unit and behaviour tests across the workspace.

use crate::{CollectionId, Coordinates, Placemark};

/// Build a valid placemark, panicking on invalid input.
///
/// # Panics
///
/// Panics when the name is blank or the coordinates are out of range.
#[must_use]
pub fn placemark(collection_id: CollectionId, name: &str, latitude: f32, longitude: f32) -> Placemark {
    match Placemark::new(collection_id, name, "", Coordinates::unchecked(latitude, longitude)) {
        Ok(placemark) => placemark,
        Err(err) => panic!("invalid test placemark: {err}"),
    }
}

#[cfg(feature = "store-sqlite")]
pub use sqlite::{memory_connection, seed_collection};

#[cfg(feature = "store-sqlite")]
mod sqlite {
    use rusqlite::Connection;

    use crate::{CollectionId, PlacemarkCollection, store};

    /// Open an in-memory database with the current schema.
    ///
    /// # Panics
    ///
    /// Panics if SQLite cannot create the schema.
    #[must_use]
    pub fn memory_connection() -> Connection {
        let mut connection = match Connection::open_in_memory() {
            Ok(connection) => connection,
            Err(err) => panic!("open in-memory database: {err}"),
        };
        if let Err(err) = store::initialise_schema(&mut connection) {
            panic!("create schema: {err}");
        }
        connection
    }

    /// Insert a collection named `name` and return its id.
    ///
    /// # Panics
    ///
    /// Panics if the collection cannot be stored.
    pub fn seed_collection(connection: &Connection, name: &str, source: &str) -> CollectionId {
        let inserted = PlacemarkCollection::new(name, source)
            .map_err(store::StoreError::from)
            .and_then(|collection| store::collections::insert(connection, &collection));
        match inserted {
            Ok(id) => id,
            Err(err) => panic!("seed collection {name:?}: {err}"),
        }
    }
}
