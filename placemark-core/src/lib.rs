//! Core domain types and storage for the placemark engine.
//!
//! Records validate on construction so that importers and the store can rely
//! on trimmed names and in-range coordinates. The SQLite store lives behind
//! the `store-sqlite` feature.

mod annotation;
mod collection;
pub mod coord;
mod placemark;
#[cfg(feature = "store-sqlite")]
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use annotation::PlacemarkAnnotation;
pub use collection::{CollectionError, PlacemarkCollection, normalise_category};
pub use coord::{CoordinateError, Coordinates, distance};
pub use placemark::{CollectionId, Placemark, PlacemarkError, PlacemarkId};
