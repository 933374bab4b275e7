use thiserror::Error;

use crate::{CoordinateError, Coordinates};

/// Store-assigned identifier of a placemark. `0` means "not yet saved".
pub type PlacemarkId = i64;

/// Store-assigned identifier of a placemark collection.
pub type CollectionId = i64;

/// Errors returned by [`Placemark::new`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlacemarkError {
    /// The name was empty once trimmed.
    #[error("placemark name must not be blank")]
    BlankName,
    /// The coordinates were missing or out of range.
    #[error("placemark {name:?} has invalid coordinates: {source}")]
    InvalidCoordinates {
        /// Trimmed name of the rejected placemark.
        name: String,
        /// Range violation reported by [`Coordinates::new`].
        #[source]
        source: CoordinateError,
    },
}

/// A named point belonging to one collection.
///
/// # Examples
///
/// ```
/// use placemark_core::{Coordinates, Placemark};
///
/// let placemark = Placemark::new(
///     3,
///     "  Fountain ",
///     "Fountain",
///     Coordinates::unchecked(41.9, 12.48),
/// )?;
/// assert_eq!(placemark.name, "Fountain");
/// assert!(placemark.description.is_empty());
/// assert_eq!(placemark.id, 0);
/// # Ok::<(), placemark_core::PlacemarkError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// Store identifier, `0` until inserted.
    pub id: PlacemarkId,
    /// Trimmed, non-blank display name.
    pub name: String,
    /// Trimmed free text; empty when it merely repeated the name.
    pub description: String,
    /// Position of the placemark.
    pub coordinates: Coordinates,
    /// Owning collection.
    pub collection_id: CollectionId,
}

impl Placemark {
    /// Validate and construct an unsaved placemark.
    pub fn new(
        collection_id: CollectionId,
        name: &str,
        description: &str,
        coordinates: Coordinates,
    ) -> Result<Self, PlacemarkError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlacemarkError::BlankName);
        }
        let coordinates = Coordinates::new(coordinates.latitude, coordinates.longitude)
            .map_err(|source| PlacemarkError::InvalidCoordinates {
                name: name.to_owned(),
                source,
            })?;
        let description = description.trim();
        let description = if description == name {
            String::new()
        } else {
            description.to_owned()
        };
        Ok(Self {
            id: 0,
            name: name.to_owned(),
            description,
            coordinates,
            collection_id,
        })
    }

    /// Report whether the placemark has been persisted.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.id != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn rejects_blank_names(#[case] name: &str) {
        let result = Placemark::new(1, name, "", Coordinates::unchecked(0.0, 0.0));
        assert_eq!(result, Err(PlacemarkError::BlankName));
    }

    #[rstest]
    fn rejects_empty_coordinates() {
        let result = Placemark::new(1, "Nowhere", "", Coordinates::EMPTY);
        assert!(matches!(
            result,
            Err(PlacemarkError::InvalidCoordinates { ref name, .. }) if name == "Nowhere"
        ));
    }

    #[rstest]
    fn keeps_distinct_description() {
        let placemark =
            Placemark::new(1, " Tower ", " Old tower ", Coordinates::unchecked(1.0, 2.0))
                .expect("valid placemark");
        assert_eq!(placemark.name, "Tower");
        assert_eq!(placemark.description, "Old tower");
        assert!(!placemark.is_saved());
    }

    #[rstest]
    fn clears_description_repeating_name() {
        let placemark = Placemark::new(1, "Tower", "  Tower", Coordinates::unchecked(1.0, 2.0))
            .expect("valid placemark");
        assert!(placemark.description.is_empty());
    }
}
