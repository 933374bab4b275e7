//! Collection rows and their manual cascade onto placemarks.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{CollectionId, PlacemarkCollection, normalise_category};

use super::{StoreError, placemarks, sqlite};

const COLUMNS: &str = "_id, name, description, category, source, last_update, poi_count";

/// Insert a collection and return its id.
///
/// The category is upper-cased; a clashing name is reported as
/// [`StoreError::Duplicate`].
pub fn insert(
    connection: &Connection,
    collection: &PlacemarkCollection,
) -> Result<CollectionId, StoreError> {
    let collection = validated(collection)?;
    connection
        .execute(
            "INSERT INTO placemark_collection
                (name, description, category, source, last_update, poi_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                collection.name.as_str(),
                collection.description.as_str(),
                collection.category.as_str(),
                collection.source.as_str(),
                collection.last_update,
                collection.poi_count,
            ),
        )
        .map_err(|source| StoreError::classify("insert collection", "collection", source))?;
    Ok(connection.last_insert_rowid())
}

/// Update the user-editable fields (name, description, category, source).
pub fn update(connection: &Connection, collection: &PlacemarkCollection) -> Result<(), StoreError> {
    let collection = validated(collection)?;
    let changed = connection
        .execute(
            "UPDATE placemark_collection
                SET name = ?2, description = ?3, category = ?4, source = ?5
                WHERE _id = ?1",
            (
                collection.id,
                collection.name.as_str(),
                collection.description.as_str(),
                collection.category.as_str(),
                collection.source.as_str(),
            ),
        )
        .map_err(|source| StoreError::classify("update collection", "collection", source))?;
    if changed == 0 {
        return Err(StoreError::MissingCollection { id: collection.id });
    }
    Ok(())
}

/// Record the outcome of a successful import.
pub fn record_import(
    connection: &Connection,
    id: CollectionId,
    last_update: i64,
    poi_count: i64,
) -> Result<(), StoreError> {
    let changed = connection
        .execute(
            "UPDATE placemark_collection SET last_update = ?2, poi_count = ?3 WHERE _id = ?1",
            (id, last_update, poi_count),
        )
        .map_err(sqlite("record collection import"))?;
    if changed == 0 {
        return Err(StoreError::MissingCollection { id });
    }
    Ok(())
}

/// Load one collection.
pub fn get(connection: &Connection, id: CollectionId) -> Result<PlacemarkCollection, StoreError> {
    connection
        .query_row(
            &format!("SELECT {COLUMNS} FROM placemark_collection WHERE _id = ?1"),
            [id],
            from_row,
        )
        .optional()
        .map_err(sqlite("load collection"))?
        .ok_or(StoreError::MissingCollection { id })
}

/// Find a collection by its exact name.
pub fn find_by_name(
    connection: &Connection,
    name: &str,
) -> Result<Option<PlacemarkCollection>, StoreError> {
    connection
        .query_row(
            &format!("SELECT {COLUMNS} FROM placemark_collection WHERE name = ?1"),
            [name.trim()],
            from_row,
        )
        .optional()
        .map_err(sqlite("find collection by name"))
}

/// All collections ordered by category then name.
pub fn list(connection: &Connection) -> Result<Vec<PlacemarkCollection>, StoreError> {
    let mut statement = connection
        .prepare_cached(&format!(
            "SELECT {COLUMNS} FROM placemark_collection ORDER BY category, name"
        ))
        .map_err(sqlite("prepare collection listing"))?;
    let rows = statement
        .query_map([], from_row)
        .map_err(sqlite("list collections"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sqlite("read collection row"))
}

/// Distinct non-empty categories in alphabetical order.
pub fn categories(connection: &Connection) -> Result<Vec<String>, StoreError> {
    let mut statement = connection
        .prepare_cached(
            "SELECT DISTINCT category FROM placemark_collection
                WHERE category != '' ORDER BY category",
        )
        .map_err(sqlite("prepare category listing"))?;
    let rows = statement
        .query_map([], |row| row.get(0))
        .map_err(sqlite("list categories"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sqlite("read category row"))
}

/// Delete a collection and all of its placemarks in one transaction.
///
/// Annotations are keyed by location and are left in place.
pub fn delete(connection: &mut Connection, id: CollectionId) -> Result<(), StoreError> {
    let transaction = connection
        .transaction()
        .map_err(sqlite("begin collection delete"))?;
    let removed = placemarks::delete_by_collection(&transaction, id)?;
    let changed = transaction
        .execute("DELETE FROM placemark_collection WHERE _id = ?1", [id])
        .map_err(sqlite("delete collection"))?;
    if changed == 0 {
        return Err(StoreError::MissingCollection { id });
    }
    transaction
        .commit()
        .map_err(sqlite("commit collection delete"))?;
    log::info!("deleted collection {id} with {removed} placemarks");
    Ok(())
}

fn validated(collection: &PlacemarkCollection) -> Result<PlacemarkCollection, StoreError> {
    let mut normalised = PlacemarkCollection::new(&collection.name, &collection.source)?
        .with_description(&collection.description);
    normalised.id = collection.id;
    normalised.category = normalise_category(&collection.category);
    normalised.last_update = collection.last_update;
    normalised.poi_count = collection.poi_count;
    Ok(normalised)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<PlacemarkCollection> {
    Ok(PlacemarkCollection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        source: row.get(4)?,
        last_update: row.get(5)?,
        poi_count: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coordinates, Placemark, test_support::memory_connection};
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        memory_connection()
    }

    fn collection(name: &str, category: &str) -> PlacemarkCollection {
        PlacemarkCollection::new(name, "/tmp/source.gpx")
            .expect("valid collection")
            .with_category(category)
    }

    #[rstest]
    fn stores_upper_cased_category(connection: Connection) {
        let mut raw = collection("Peaks", "");
        raw.category = "mountains".into();
        let id = insert(&connection, &raw).expect("insert");
        let loaded = get(&connection, id).expect("load");
        assert_eq!(loaded.category, "MOUNTAINS");
        assert_eq!(loaded.last_update, 0);
    }

    #[rstest]
    fn rejects_duplicate_names(connection: Connection) {
        insert(&connection, &collection("Peaks", "A")).expect("first");
        let err = insert(&connection, &collection("Peaks", "B")).expect_err("duplicate name");
        assert!(err.is_duplicate());
    }

    #[rstest]
    fn lists_by_category_then_name(connection: Connection) {
        insert(&connection, &collection("Zoo", "a")).expect("insert");
        insert(&connection, &collection("Bars", "b")).expect("insert");
        insert(&connection, &collection("Apes", "a")).expect("insert");
        insert(&connection, &collection("Loose", "")).expect("insert");
        let names: Vec<_> = list(&connection)
            .expect("list")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Loose", "Apes", "Zoo", "Bars"]);
        assert_eq!(categories(&connection).expect("categories"), ["A", "B"]);
    }

    #[rstest]
    fn records_import_metadata(connection: Connection) {
        let id = insert(&connection, &collection("Fuel", "")).expect("insert");
        record_import(&connection, id, 1_700_000_000_000, 12).expect("record");
        let loaded = get(&connection, id).expect("load");
        assert_eq!(loaded.last_update, 1_700_000_000_000);
        assert_eq!(loaded.poi_count, 12);
        assert!(loaded.was_imported());
    }

    #[rstest]
    fn renames_collection(connection: Connection) {
        let id = insert(&connection, &collection("Old", "x")).expect("insert");
        let mut renamed = get(&connection, id).expect("load");
        renamed.name = "New".into();
        update(&connection, &renamed).expect("update");
        assert!(find_by_name(&connection, "Old").expect("lookup").is_none());
        assert_eq!(
            find_by_name(&connection, "New").expect("lookup").map(|c| c.id),
            Some(id)
        );
    }

    #[rstest]
    fn delete_cascades_to_placemarks(mut connection: Connection) {
        let id = insert(&connection, &collection("Fuel", "")).expect("insert");
        let placemark = Placemark::new(id, "Station", "", Coordinates::unchecked(1.0, 1.0))
            .expect("placemark");
        placemarks::insert(&connection, &placemark).expect("insert placemark");

        delete(&mut connection, id).expect("delete");

        assert!(matches!(
            get(&connection, id),
            Err(StoreError::MissingCollection { .. })
        ));
        assert_eq!(placemarks::count_by_collection(&connection, id).expect("count"), 0);
    }
}
