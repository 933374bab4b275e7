//! Placemark rows keyed by id, unique per collection and location.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{CollectionId, Coordinates, Placemark, PlacemarkId};

use super::{StoreError, sqlite};

pub(crate) const COLUMNS: &str = "p._id, p.latitude, p.longitude, p.name, p.description, p.collection_id";

/// Insert `placemark` and return its new id.
///
/// A placemark at a location already used in its collection is rejected with
/// [`StoreError::Duplicate`].
pub fn insert(connection: &Connection, placemark: &Placemark) -> Result<PlacemarkId, StoreError> {
    if !placemark.coordinates.is_valid() {
        return Err(StoreError::InvalidPlacemark {
            name: placemark.name.clone(),
        });
    }
    let (latitude, longitude) = placemark.coordinates.to_fixed();
    let mut statement = connection
        .prepare_cached(
            "INSERT INTO placemark (latitude, longitude, name, description, collection_id)
                VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sqlite("prepare placemark insert"))?;
    statement
        .execute((
            latitude,
            longitude,
            placemark.name.as_str(),
            placemark.description.as_str(),
            placemark.collection_id,
        ))
        .map_err(|source| StoreError::classify("insert placemark", "placemark", source))?;
    Ok(connection.last_insert_rowid())
}

/// Load one placemark.
pub fn get(connection: &Connection, id: PlacemarkId) -> Result<Placemark, StoreError> {
    connection
        .query_row(
            &format!("SELECT {COLUMNS} FROM placemark AS p WHERE p._id = ?1"),
            [id],
            from_row,
        )
        .optional()
        .map_err(sqlite("load placemark"))?
        .ok_or(StoreError::MissingPlacemark { id })
}

/// All placemarks of a collection ordered by name.
pub fn list_by_collection(
    connection: &Connection,
    collection_id: CollectionId,
) -> Result<Vec<Placemark>, StoreError> {
    let mut statement = connection
        .prepare_cached(&format!(
            "SELECT {COLUMNS} FROM placemark AS p WHERE p.collection_id = ?1 ORDER BY p.name, p._id"
        ))
        .map_err(sqlite("prepare placemark listing"))?;
    let rows = statement
        .query_map([collection_id], from_row)
        .map_err(sqlite("list placemarks"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sqlite("read placemark row"))
}

/// Number of placemarks stored for a collection.
pub fn count_by_collection(
    connection: &Connection,
    collection_id: CollectionId,
) -> Result<i64, StoreError> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM placemark WHERE collection_id = ?1",
            [collection_id],
            |row| row.get(0),
        )
        .map_err(sqlite("count placemarks"))
}

/// Delete every placemark of a collection, returning the number removed.
pub fn delete_by_collection(
    connection: &Connection,
    collection_id: CollectionId,
) -> Result<usize, StoreError> {
    connection
        .execute(
            "DELETE FROM placemark WHERE collection_id = ?1",
            [collection_id],
        )
        .map_err(sqlite("delete collection placemarks"))
}

/// Map a row selected with [`COLUMNS`] into a [`Placemark`].
pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Placemark> {
    Ok(Placemark {
        id: row.get(0)?,
        coordinates: Coordinates::from_fixed(row.get(1)?, row.get(2)?),
        name: row.get(3)?,
        description: row.get(4)?,
        collection_id: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_connection;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        memory_connection()
    }

    fn placemark(collection_id: CollectionId, name: &str, latitude: f32, longitude: f32) -> Placemark {
        Placemark::new(
            collection_id,
            name,
            "",
            Coordinates::unchecked(latitude, longitude),
        )
        .expect("valid placemark")
    }

    #[rstest]
    fn inserts_and_loads(connection: Connection) {
        let id = insert(&connection, &placemark(1, "Arch", 10.5, -3.25)).expect("insert");
        let loaded = get(&connection, id).expect("load");
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.name, "Arch");
        assert_eq!(loaded.coordinates, Coordinates::unchecked(10.5, -3.25));
    }

    #[rstest]
    fn rejects_duplicate_location_in_collection(connection: Connection) {
        insert(&connection, &placemark(1, "First", 1.0, 1.0)).expect("first insert");
        let err = insert(&connection, &placemark(1, "Second", 1.0, 1.0))
            .expect_err("duplicate should fail");
        assert!(err.is_duplicate());
        insert(&connection, &placemark(2, "Other collection", 1.0, 1.0))
            .expect("same location in another collection");
    }

    #[rstest]
    fn rejects_out_of_range_coordinates(connection: Connection) {
        let mut invalid = placemark(1, "Pole", 0.0, 0.0);
        invalid.coordinates = Coordinates::unchecked(91.0, 0.0);
        let err = insert(&connection, &invalid).expect_err("invalid coordinates");
        assert!(matches!(err, StoreError::InvalidPlacemark { .. }));
    }

    #[rstest]
    fn deletes_only_the_given_collection(connection: Connection) {
        insert(&connection, &placemark(1, "A", 1.0, 1.0)).expect("insert");
        insert(&connection, &placemark(1, "B", 2.0, 2.0)).expect("insert");
        insert(&connection, &placemark(2, "C", 3.0, 3.0)).expect("insert");

        assert_eq!(delete_by_collection(&connection, 1).expect("delete"), 2);
        assert_eq!(count_by_collection(&connection, 1).expect("count"), 0);
        let remaining = list_by_collection(&connection, 2).expect("list");
        assert_eq!(remaining.len(), 1);
    }

    #[rstest]
    fn missing_placemark_is_reported(connection: Connection) {
        let err = get(&connection, 42).expect_err("nothing stored");
        assert!(matches!(err, StoreError::MissingPlacemark { id: 42 }));
    }
}
