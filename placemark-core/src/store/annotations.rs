//! Annotation rows keyed by exact fixed-point location.
//!
//! Absence of a row is equivalent to the default annotation; saving a default
//! annotation deletes its row.

use rusqlite::{Connection, OptionalExtension};

use crate::{Coordinates, PlacemarkAnnotation};

use super::{StoreError, sqlite};

/// Fixed-point key for `coordinates`, rejecting empty or out-of-range values
/// that would otherwise saturate onto another location.
fn key(coordinates: Coordinates) -> Result<(i32, i32), StoreError> {
    if coordinates.is_valid() {
        Ok(coordinates.to_fixed())
    } else {
        Err(StoreError::InvalidAnnotation { coordinates })
    }
}

/// Load the annotation for `coordinates`, or a fresh default if none exists.
pub fn load(
    connection: &Connection,
    coordinates: Coordinates,
) -> Result<PlacemarkAnnotation, StoreError> {
    let (latitude, longitude) = key(coordinates)?;
    let stored = connection
        .query_row(
            "SELECT note, flag FROM placemark_annotation WHERE latitude = ?1 AND longitude = ?2",
            [latitude, longitude],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0)),
        )
        .optional()
        .map_err(sqlite("load annotation"))?;
    Ok(match stored {
        Some((note, flagged)) => PlacemarkAnnotation {
            coordinates,
            note,
            flagged,
        },
        None => PlacemarkAnnotation::empty(coordinates),
    })
}

/// Persist `annotation`, deleting its row when it is back to default.
pub fn save(connection: &Connection, annotation: &PlacemarkAnnotation) -> Result<(), StoreError> {
    let (latitude, longitude) = key(annotation.coordinates)?;
    if annotation.is_default() {
        connection
            .execute(
                "DELETE FROM placemark_annotation WHERE latitude = ?1 AND longitude = ?2",
                [latitude, longitude],
            )
            .map_err(sqlite("delete annotation"))?;
        return Ok(());
    }
    connection
        .execute(
            "INSERT INTO placemark_annotation (latitude, longitude, note, flag)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (latitude, longitude)
                DO UPDATE SET note = excluded.note, flag = excluded.flag",
            (
                latitude,
                longitude,
                annotation.note.trim(),
                i64::from(annotation.flagged),
            ),
        )
        .map_err(sqlite("save annotation"))?;
    Ok(())
}

/// All flagged annotations, ordered by location.
pub fn list_flagged(connection: &Connection) -> Result<Vec<PlacemarkAnnotation>, StoreError> {
    let mut statement = connection
        .prepare_cached(
            "SELECT latitude, longitude, note FROM placemark_annotation
                WHERE flag != 0 ORDER BY latitude, longitude",
        )
        .map_err(sqlite("prepare flagged annotations"))?;
    let rows = statement
        .query_map([], |row| {
            Ok(PlacemarkAnnotation {
                coordinates: Coordinates::from_fixed(row.get(0)?, row.get(1)?),
                note: row.get(2)?,
                flagged: true,
            })
        })
        .map_err(sqlite("list flagged annotations"))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sqlite("read annotation row"))
}
