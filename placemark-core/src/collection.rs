use thiserror::Error;

use crate::CollectionId;

/// Errors returned when validating a [`PlacemarkCollection`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// The collection name was empty once trimmed.
    #[error("collection name must not be blank")]
    BlankName,
}

/// A named, categorised group of placemarks sharing one import source.
///
/// # Examples
///
/// ```
/// use placemark_core::PlacemarkCollection;
///
/// let collection = PlacemarkCollection::new("Fuel", "/data/fuel.ov2")?
///     .with_category("services");
/// assert_eq!(collection.category, "SERVICES");
/// assert_eq!(collection.last_update, 0);
/// # Ok::<(), placemark_core::CollectionError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlacemarkCollection {
    /// Store identifier, `0` until inserted.
    pub id: CollectionId,
    /// Unique display name.
    pub name: String,
    /// Free text shown alongside the name.
    pub description: String,
    /// Upper-cased grouping label; may be empty.
    pub category: String,
    /// File path or URL the placemarks are imported from.
    pub source: String,
    /// Epoch milliseconds of the last successful import, `0` if never.
    pub last_update: i64,
    /// Placemark count recorded by the last successful import.
    pub poi_count: i64,
}

impl PlacemarkCollection {
    /// Validate and construct an unsaved collection.
    pub fn new(name: &str, source: &str) -> Result<Self, CollectionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CollectionError::BlankName);
        }
        Ok(Self {
            name: name.to_owned(),
            source: source.trim().to_owned(),
            ..Self::default()
        })
    }

    /// Set the category, normalised to upper case.
    #[must_use]
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = normalise_category(category);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        description.trim().clone_into(&mut self.description);
        self
    }

    /// Report whether the collection was ever imported successfully.
    #[must_use]
    pub const fn was_imported(&self) -> bool {
        self.last_update > 0
    }
}

/// Trim and upper-case a category label.
#[must_use]
pub fn normalise_category(category: &str) -> String {
    category.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn rejects_blank_name() {
        assert_eq!(
            PlacemarkCollection::new(" ", "file.gpx"),
            Err(CollectionError::BlankName)
        );
    }

    #[rstest]
    #[case("museums", "MUSEUMS")]
    #[case("  Café ", "CAFÉ")]
    #[case("", "")]
    fn upper_cases_category(#[case] raw: &str, #[case] expected: &str) {
        let collection = PlacemarkCollection::new("Name", "src")
            .expect("valid collection")
            .with_category(raw);
        assert_eq!(collection.category, expected);
    }
}
