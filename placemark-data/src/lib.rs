//! Import pipeline and backup support for the placemark engine.
//!
//! - [`resolve`] turns a source locator into a byte stream.
//! - [`import`] holds the format importers and the dispatch rules.
//! - [`ImportFacade`] drives an import into the store as one transaction.
//! - [`ArchiveManager`] copies raw store files into and out of a ZIP file.

pub mod archive;
mod config;
mod facade;
pub mod import;
mod progress;
pub mod resolve;

pub use archive::{ArchiveError, ArchiveManager};
pub use config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_USER_AGENT, ImportConfig};
pub use facade::{ImportFacade, ImportReport};
pub use import::{
    CoordinateOrder, FormatFilter, ImportError, ImportFormat, PlacemarkDraft, UnknownFilter,
    select_format,
};
pub use progress::{NoProgress, ProgressSink};
pub use resolve::{Resource, ResolveError, ResourceResolver, SourceResolver, join_locator};
pub use tokio_util::sync::CancellationToken;
