use crate::Coordinates;

/// User data attached to an exact location rather than to a placemark.
///
/// Any placemark sitting on the same fixed-point coordinates shares the
/// annotation, and it survives re-imports of the placemark that first
/// carried it. The default state (empty note, not flagged) is never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacemarkAnnotation {
    /// Location the annotation is keyed on.
    pub coordinates: Coordinates,
    /// Free-text note.
    pub note: String,
    /// Favourite flag.
    pub flagged: bool,
}

impl PlacemarkAnnotation {
    /// Annotation in its default, unpersisted state.
    #[must_use]
    pub const fn empty(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            note: String::new(),
            flagged: false,
        }
    }

    /// Report whether this annotation carries no user data.
    #[must_use]
    pub fn is_default(&self) -> bool {
        !self.flagged && self.note.trim().is_empty()
    }
}
