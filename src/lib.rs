//! Facade crate for the placemark engine.
//!
//! This crate re-exports the core domain types and exposes the SQLite store
//! and the import pipeline behind feature flags.

#![forbid(unsafe_code)]

pub use placemark_core::{
    CollectionError, CollectionId, CoordinateError, Coordinates, Placemark, PlacemarkAnnotation,
    PlacemarkCollection, PlacemarkError, PlacemarkId, distance,
};

#[cfg(feature = "store-sqlite")]
pub use placemark_core::store::{
    DatabaseHandle, ProximityQuery, SearchError, SearchHit, StoreError, search,
};

#[cfg(feature = "import")]
pub use placemark_data::{
    ArchiveError, ArchiveManager, FormatFilter, ImportConfig, ImportError, ImportFacade,
    ImportReport,
};
