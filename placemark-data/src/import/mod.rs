//! Format importers.
//!
//! Every importer reads one byte stream and pushes [`PlacemarkDraft`]s into a
//! [`PlacemarkSink`]. Drafts are validated by the sink, so importers only
//! decide what a source's name, description and position are. A stream-level
//! failure aborts the whole import; per-record problems never reach here as
//! errors.

use std::{io, sync::Arc};

use placemark_core::store::StoreError;
use thiserror::Error;

use crate::resolve::{ResolveError, Resource, ResourceResolver, join_locator};

mod draft;
mod format;
mod geojson;
mod georss;
mod gpx;
mod kml;
mod ov2;
mod text;
mod xml;
mod zip;

pub use draft::PlacemarkDraft;
pub use format::{
    CoordinateOrder, FormatFilter, ImportFormat, UnknownFilter, select_entry_format, select_format,
};
pub use geojson::GeoJsonImporter;
pub use georss::GeoRssImporter;
pub use gpx::GpxImporter;
pub use kml::KmlImporter;
pub use ov2::Ov2Importer;
pub use text::TextImporter;
pub use zip::ZipImporter;

/// Errors that abort an import.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    /// No importer matches the source.
    #[error("no importer found for {locator} (MIME type {mime_type:?})")]
    NoImporter {
        /// Source locator.
        locator: String,
        /// Declared MIME type, if any.
        mime_type: Option<String>,
    },
    /// The source could not be opened.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Reading the stream failed.
    #[error("failed to read {format} stream: {source}")]
    Read {
        /// Format being read.
        format: ImportFormat,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// An XML document was malformed.
    #[error("malformed XML near byte {position}: {source}")]
    Xml {
        /// Byte offset where the parser stopped.
        position: u64,
        /// Parser error.
        source: quick_xml::Error,
    },
    /// A GeoJSON document was malformed.
    #[error("malformed GeoJSON: {0}")]
    Json(#[source] serde_json::Error),
    /// An OV2 record was corrupt.
    #[error("corrupt OV2 record at byte {offset}: {reason}")]
    Ov2 {
        /// Offset of the record's type byte.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },
    /// A ZIP container or one of its entries was unreadable.
    #[error("unreadable ZIP archive: {0}")]
    Zip(#[source] ::zip::result::ZipError),
    /// Spooling a stream to a temporary file failed.
    #[error("failed to spool archive to a temporary file: {0}")]
    Spool(#[source] io::Error),
    /// Writing to the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The parser stopped without reporting an outcome.
    #[error("the import parser stopped without finishing")]
    ProducerVanished,
    /// The import was cancelled.
    #[error("import cancelled")]
    Cancelled,
    /// The background runtime could not be built.
    #[error("failed to build import runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Receives drafts from an importer.
pub trait PlacemarkSink {
    /// Accept one draft. An error stops the importer.
    fn accept(&mut self, draft: PlacemarkDraft) -> Result<(), ImportError>;
}

impl PlacemarkSink for Vec<PlacemarkDraft> {
    fn accept(&mut self, draft: PlacemarkDraft) -> Result<(), ImportError> {
        self.push(draft);
        Ok(())
    }
}

/// Reads one stream of a particular format.
pub trait Importer {
    /// Read `reader` to the end, pushing drafts into `sink`.
    fn import(&mut self, reader: &mut dyn io::Read, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError>;
}

/// What an importer needs to follow links and open archive entries.
#[derive(Clone)]
pub struct ImportContext {
    resolver: Arc<dyn ResourceResolver>,
    locator: String,
    filter: FormatFilter,
    depth: usize,
    max_link_depth: usize,
}

impl std::fmt::Debug for ImportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportContext")
            .field("locator", &self.locator)
            .field("filter", &self.filter)
            .field("depth", &self.depth)
            .field("max_link_depth", &self.max_link_depth)
            .finish_non_exhaustive()
    }
}

impl ImportContext {
    /// Context for the top-level document at `locator`.
    pub fn new(
        resolver: Arc<dyn ResourceResolver>,
        locator: impl Into<String>,
        filter: FormatFilter,
        max_link_depth: usize,
    ) -> Self {
        Self {
            resolver,
            locator: locator.into(),
            filter,
            depth: 0,
            max_link_depth,
        }
    }

    /// Locator of the document being read.
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Filter chosen for the collection.
    #[must_use]
    pub const fn filter(&self) -> FormatFilter {
        self.filter
    }

    /// Context for an entry of the current container; depth is unchanged.
    #[must_use]
    pub fn entry(&self, name: &str) -> Self {
        Self {
            locator: join_locator(&self.locator, name),
            ..self.clone()
        }
    }

    /// Import the document linked from the current one by `href`.
    ///
    /// Links beyond the maximum depth and links that cannot be opened are
    /// logged and skipped; parse errors in the linked document propagate.
    pub fn follow_link(&self, href: &str, sink: &mut dyn PlacemarkSink) -> Result<(), ImportError> {
        let target = join_locator(&self.locator, href);
        if self.depth >= self.max_link_depth {
            log::warn!("not following link to {target}: nested deeper than {}", self.max_link_depth);
            return Ok(());
        }
        let resource = match self.resolver.open(&target) {
            Ok(resource) => resource,
            Err(err) => {
                log::warn!("skipping unreachable link {target}: {err}");
                return Ok(());
            }
        };
        let Some(format) = select_format(resource.mime_type.as_deref(), &resource.name, self.filter)
        else {
            log::warn!("skipping link {target}: no importer for it");
            return Ok(());
        };
        let nested = Self {
            locator: resource.name.clone(),
            depth: self.depth + 1,
            ..self.clone()
        };
        log::debug!("following link to {target} as {format}");
        run(format, nested, resource, sink)
    }
}

impl ImportFormat {
    /// Fresh importer for this format.
    #[must_use]
    pub fn importer(self, context: ImportContext) -> Box<dyn Importer> {
        match self {
            Self::Gpx => Box::new(GpxImporter::default()),
            Self::Kml => Box::new(KmlImporter::new(context)),
            Self::GeoRss => Box::new(GeoRssImporter::default()),
            Self::GeoJson => Box::new(GeoJsonImporter),
            Self::Ov2 => Box::new(Ov2Importer),
            Self::Text(order) => Box::new(TextImporter::new(order)),
            Self::Zip => Box::new(ZipImporter::new(context)),
        }
    }
}

/// Import `resource` as `format`.
pub fn run(
    format: ImportFormat,
    context: ImportContext,
    mut resource: Resource,
    sink: &mut dyn PlacemarkSink,
) -> Result<(), ImportError> {
    format.importer(context).import(&mut resource.reader, sink)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for importer unit tests.

    use std::{collections::HashMap, io::Cursor, sync::Arc};

    use super::{ImportContext, FormatFilter, Importer, PlacemarkDraft};
    use crate::resolve::{ResolveError, Resource, ResourceResolver};

    /// Resolver serving fixed in-memory documents.
    #[derive(Debug, Default)]
    pub(crate) struct FixtureResolver {
        documents: HashMap<String, Vec<u8>>,
    }

    impl FixtureResolver {
        pub(crate) fn with(mut self, locator: &str, body: &[u8]) -> Self {
            self.documents.insert(locator.to_owned(), body.to_vec());
            self
        }
    }

    impl ResourceResolver for FixtureResolver {
        fn open(&self, locator: &str) -> Result<Resource, ResolveError> {
            self.documents
                .get(locator)
                .map(|body| Resource::new(Cursor::new(body.clone()), locator))
                .ok_or_else(|| ResolveError::Io {
                    locator: locator.to_owned(),
                    source: std::io::ErrorKind::NotFound.into(),
                })
        }
    }

    pub(crate) fn context(resolver: FixtureResolver, locator: &str) -> ImportContext {
        ImportContext::new(Arc::new(resolver), locator, FormatFilter::None, 2)
    }

    pub(crate) fn drafts(importer: &mut dyn Importer, body: &[u8]) -> Vec<PlacemarkDraft> {
        let mut sink = Vec::new();
        importer
            .import(&mut Cursor::new(body.to_vec()), &mut sink)
            .expect("import succeeds");
        sink
    }
}
