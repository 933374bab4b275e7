//! Import orchestration: resolve, dispatch, parse and persist.
//!
//! [`ImportFacade`] turns a collection's source locator into placemarks in
//! the store. Each import replaces the collection's placemarks inside one
//! transaction, so a failed import leaves the previous contents intact.

use std::sync::Arc;

use placemark_core::{
    CollectionId, PlacemarkCollection,
    store::{DatabaseHandle, collections},
};
use tokio::{runtime::Runtime, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ImportConfig,
    import::{FormatFilter, ImportContext, ImportError, select_format},
    progress::ProgressSink,
    resolve::{ResourceResolver, SourceResolver},
};

mod pipeline;

use pipeline::Consumer;

/// Outcome of one successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Collection that was imported.
    pub collection_id: CollectionId,
    /// Placemarks written to the store.
    pub inserted: usize,
    /// Placemarks rejected because the collection already held that position.
    pub duplicates: usize,
    /// Records dropped before reaching the store (blank name, bad position).
    pub skipped: usize,
    /// Whether the collection's last-update time and count were refreshed.
    pub metadata_updated: bool,
}

impl ImportReport {
    const fn new(collection_id: CollectionId) -> Self {
        Self {
            collection_id,
            inserted: 0,
            duplicates: 0,
            skipped: 0,
            metadata_updated: false,
        }
    }
}

/// Drives imports against one database.
///
/// The facade owns a multi-threaded Tokio runtime sized by
/// [`ImportConfig::workers`]. Parsers run on its blocking pool while the
/// calling thread writes to the store.
pub struct ImportFacade<'db> {
    database: &'db DatabaseHandle,
    config: ImportConfig,
    resolver: Arc<dyn ResourceResolver>,
    runtime: Runtime,
}

impl std::fmt::Debug for ImportFacade<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportFacade")
            .field("database", &self.database)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish_non_exhaustive()
    }
}

impl<'db> ImportFacade<'db> {
    /// Create a facade resolving sources with a [`SourceResolver`].
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Runtime`] when the runtime cannot be built and
    /// [`ImportError::Resolve`] when the HTTP client cannot be built.
    pub fn new(database: &'db DatabaseHandle, config: ImportConfig) -> Result<Self, ImportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers.max(1))
            .max_blocking_threads(config.workers.max(1))
            .thread_name("placemark-import")
            .enable_all()
            .build()
            .map_err(ImportError::Runtime)?;
        let resolver = SourceResolver::new(&config, runtime.handle().clone())?;
        Ok(Self {
            database,
            config,
            resolver: Arc::new(resolver),
            runtime,
        })
    }

    /// Replace the resolver, e.g. to serve sources from memory.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ResourceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Import `collection` from its source, replacing its placemarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened, no importer matches
    /// it, the document is malformed, or the store rejects the write. The
    /// collection's previous placemarks are untouched in every error case.
    ///
    /// # Panics
    ///
    /// Panics if the database is locked, or if called from within an
    /// asynchronous context.
    pub fn import(
        &self,
        collection: &PlacemarkCollection,
        filter: FormatFilter,
        progress: &dyn ProgressSink,
    ) -> Result<ImportReport, ImportError> {
        self.import_with_cancellation(collection, filter, progress, &CancellationToken::new())
    }

    /// [`ImportFacade::import`] that stops with [`ImportError::Cancelled`]
    /// once `token` is cancelled.
    ///
    /// # Errors
    ///
    /// As for [`ImportFacade::import`], plus [`ImportError::Cancelled`].
    ///
    /// # Panics
    ///
    /// As for [`ImportFacade::import`].
    pub fn import_with_cancellation(
        &self,
        collection: &PlacemarkCollection,
        filter: FormatFilter,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        let title = format!("Importing {}", collection.name);
        log::info!("importing collection {} from {}", collection.id, collection.source);
        progress.update(&title, &format!("Opening {}", collection.source));

        let resource = self.resolver.open(&collection.source)?;
        let format = select_format(resource.mime_type.as_deref(), &resource.name, filter).ok_or_else(
            || ImportError::NoImporter {
                locator: collection.source.clone(),
                mime_type: resource.mime_type.clone(),
            },
        )?;
        log::debug!("reading {} as {format}", collection.source);

        let lease = self.database.open()?;
        let (sender, receiver) = mpsc::channel(self.config.queue_capacity.max(1));
        let producer_token = token.child_token();
        let context = ImportContext::new(
            Arc::clone(&self.resolver),
            collection.source.as_str(),
            filter,
            self.config.max_link_depth,
        );
        let producer = {
            let token = producer_token.clone();
            let collection_id = collection.id;
            self.runtime.spawn_blocking(move || {
                pipeline::produce(format, context, resource, collection_id, sender, token);
            })
        };

        let consumer = Consumer {
            runtime: &self.runtime,
            token: &producer_token,
            progress,
            progress_interval: self.config.progress_interval.max(1),
        };
        match consumer.consume(&lease, collection, receiver) {
            Ok(report) => {
                if let Err(err) = self.runtime.block_on(producer) {
                    log::warn!("import producer for collection {} failed after finishing: {err}", collection.id);
                }
                log::info!(
                    "imported {} placemarks into collection {} ({} duplicates, {} skipped)",
                    report.inserted,
                    collection.id,
                    report.duplicates,
                    report.skipped
                );
                progress.update(&title, &format!("{} placemarks imported", report.inserted));
                Ok(report)
            }
            Err(err) => {
                // The receiver is gone, so a producer blocked on a full queue
                // wakes up and stops.
                producer_token.cancel();
                log::warn!("import of collection {} failed: {err}", collection.id);
                Err(err)
            }
        }
    }

    /// Import each collection in `ids` in turn.
    ///
    /// Every collection is attempted; the outcomes are returned in order.
    ///
    /// # Panics
    ///
    /// As for [`ImportFacade::import`].
    pub fn update_collections(
        &self,
        ids: &[CollectionId],
        filter: FormatFilter,
        progress: &dyn ProgressSink,
    ) -> Vec<(CollectionId, Result<ImportReport, ImportError>)> {
        ids.iter()
            .map(|&id| {
                let outcome = self
                    .load(id)
                    .and_then(|collection| self.import(&collection, filter, progress));
                (id, outcome)
            })
            .collect()
    }

    fn load(&self, id: CollectionId) -> Result<PlacemarkCollection, ImportError> {
        let lease = self.database.open()?;
        let connection = lease.connection();
        Ok(collections::get(&connection, id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::test_support::FixtureResolver;
    use crate::progress::NoProgress;
    use placemark_core::store::placemarks;
    use rstest::{fixture, rstest};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const GPX: &[u8] = br#"<gpx><wpt lat="1.0" lon="2.0"><name>Test</name><desc>descTest</desc></wpt>
        <wpt lat="3.0" lon="4.0"><name>Other</name></wpt>
        <wpt lat="3.0" lon="4.0"><name>Same spot</name></wpt>
        <wpt lat="95.0" lon="4.0"><name>Off the map</name></wpt></gpx>"#;

    struct Store {
        _dir: TempDir,
        handle: DatabaseHandle,
    }

    #[fixture]
    fn store() -> Store {
        let dir = TempDir::new().expect("temp dir");
        let handle = DatabaseHandle::new(dir.path().join("placemarks.db"));
        Store { _dir: dir, handle }
    }

    fn collection(handle: &DatabaseHandle, source: &str) -> PlacemarkCollection {
        let lease = handle.open().expect("open");
        let connection = lease.connection();
        let collection = PlacemarkCollection::new("Trip", source).expect("collection");
        let id = collections::insert(&connection, &collection).expect("insert collection");
        collections::get(&connection, id).expect("reload")
    }

    fn facade<'db>(handle: &'db DatabaseHandle, resolver: FixtureResolver) -> ImportFacade<'db> {
        ImportFacade::new(handle, ImportConfig::default().with_queue_capacity(1))
            .expect("facade")
            .with_resolver(Arc::new(resolver))
    }

    #[rstest]
    fn imports_and_reports_counts(store: Store) {
        let trip = collection(&store.handle, "/data/trip.gpx");
        let facade = facade(&store.handle, FixtureResolver::default().with("/data/trip.gpx", GPX));
        let messages = Mutex::new(Vec::new());
        let progress = |title: &str, message: &str| {
            messages
                .lock()
                .expect("progress lock")
                .push(format!("{title}: {message}"));
        };
        let report = facade
            .import(&trip, FormatFilter::None, &progress)
            .expect("import succeeds");
        assert_eq!(
            report,
            ImportReport {
                collection_id: trip.id,
                inserted: 2,
                duplicates: 1,
                skipped: 1,
                metadata_updated: true,
            }
        );
        let lease = store.handle.open().expect("open");
        let connection = lease.connection();
        let reloaded = collections::get(&connection, trip.id).expect("reload");
        assert_eq!(reloaded.poi_count, 2);
        assert!(reloaded.was_imported());
        assert!(
            messages
                .lock()
                .expect("progress lock")
                .last()
                .is_some_and(|message| message.ends_with("2 placemarks imported"))
        );
        drop(connection);
        drop(lease);
        assert!(store.handle.is_closed());
    }

    #[rstest]
    fn unknown_source_fails_before_touching_the_store(store: Store) {
        let trip = collection(&store.handle, "/data/trip.bin");
        let facade = facade(&store.handle, FixtureResolver::default().with("/data/trip.bin", b"??"));
        let err = facade
            .import(&trip, FormatFilter::None, &NoProgress)
            .expect_err("no importer");
        assert!(matches!(err, ImportError::NoImporter { .. }));
        assert!(store.handle.is_closed());
    }

    #[rstest]
    fn cancelled_import_keeps_previous_placemarks(store: Store) {
        let trip = collection(&store.handle, "/data/trip.gpx");
        let facade = facade(&store.handle, FixtureResolver::default().with("/data/trip.gpx", GPX));
        facade
            .import(&trip, FormatFilter::None, &NoProgress)
            .expect("first import");

        let token = CancellationToken::new();
        token.cancel();
        let err = facade
            .import_with_cancellation(&trip, FormatFilter::None, &NoProgress, &token)
            .expect_err("cancelled");
        assert!(matches!(err, ImportError::Cancelled));

        let lease = store.handle.open().expect("open");
        let connection = lease.connection();
        assert_eq!(placemarks::count_by_collection(&connection, trip.id).expect("count"), 2);
    }

    #[rstest]
    fn update_collections_reports_each_outcome(store: Store) {
        let good = collection(&store.handle, "/data/trip.gpx");
        let facade = facade(&store.handle, FixtureResolver::default().with("/data/trip.gpx", GPX));
        let outcomes = facade.update_collections(&[good.id, 999], FormatFilter::None, &NoProgress);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[0], (id, Ok(report)) if *id == good.id && report.inserted == 2));
        assert!(matches!(&outcomes[1], (999, Err(ImportError::Store(_)))));
    }
}
