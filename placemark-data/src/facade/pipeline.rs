//! Bounded producer/consumer plumbing behind [`super::ImportFacade`].
//!
//! The producer parses on a blocking worker and pushes events into a bounded
//! channel; the consumer drains it inside one store transaction. A full
//! channel blocks the producer, an empty one blocks the consumer.

use std::time::{SystemTime, UNIX_EPOCH};

use placemark_core::{
    CollectionId, Placemark, PlacemarkCollection,
    store::{OpenDatabase, StoreError, collections, placemarks},
};
use tokio::{runtime::Runtime, sync::mpsc};
use tokio_util::sync::CancellationToken;

use super::ImportReport;
use crate::{
    import::{ImportContext, ImportError, ImportFormat, PlacemarkDraft, PlacemarkSink, run},
    progress::ProgressSink,
    resolve::Resource,
};

/// What the producer tells the consumer.
#[derive(Debug)]
pub(super) enum Event {
    Placemark(Placemark),
    End { skipped: usize },
    Failed(ImportError),
}

/// Sink that validates drafts and forwards them over the channel.
struct ChannelSink {
    collection_id: CollectionId,
    sender: mpsc::Sender<Event>,
    token: CancellationToken,
    skipped: usize,
}

impl PlacemarkSink for ChannelSink {
    fn accept(&mut self, draft: PlacemarkDraft) -> Result<(), ImportError> {
        if self.token.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        match draft.into_placemark(self.collection_id) {
            Ok(placemark) => self
                .sender
                .blocking_send(Event::Placemark(placemark))
                .map_err(|_| ImportError::Cancelled),
            Err(err) => {
                log::debug!("skipping placemark: {err}");
                self.skipped += 1;
                Ok(())
            }
        }
    }
}

/// Parse `resource` to the end, reporting the outcome as the final event.
///
/// Runs on a blocking worker. A cancelled import sends nothing more: the
/// consumer is already gone or about to observe the token.
pub(super) fn produce(
    format: ImportFormat,
    context: ImportContext,
    resource: Resource,
    collection_id: CollectionId,
    sender: mpsc::Sender<Event>,
    token: CancellationToken,
) {
    let mut sink = ChannelSink {
        collection_id,
        sender,
        token,
        skipped: 0,
    };
    let event = match run(format, context, resource, &mut sink) {
        Ok(()) => Event::End {
            skipped: sink.skipped,
        },
        Err(ImportError::Cancelled) => {
            log::debug!("producer for collection {collection_id} cancelled");
            return;
        }
        Err(err) => Event::Failed(err),
    };
    if sink.sender.blocking_send(event).is_err() {
        log::debug!("consumer for collection {collection_id} went away before the last event");
    }
}

/// Drain `receiver` into the store as one replace-all transaction.
pub(super) struct Consumer<'a> {
    pub(super) runtime: &'a Runtime,
    pub(super) token: &'a CancellationToken,
    pub(super) progress: &'a dyn ProgressSink,
    pub(super) progress_interval: usize,
}

impl Consumer<'_> {
    pub(super) fn consume(
        &self,
        lease: &OpenDatabase<'_>,
        collection: &PlacemarkCollection,
        mut receiver: mpsc::Receiver<Event>,
    ) -> Result<ImportReport, ImportError> {
        let mut connection = lease.connection();
        let transaction = connection.transaction().map_err(|source| StoreError::Sqlite {
            operation: "begin import transaction",
            source,
        })?;
        let removed = placemarks::delete_by_collection(&transaction, collection.id)?;
        log::debug!("cleared {removed} placemarks from collection {}", collection.id);

        let mut report = ImportReport::new(collection.id);
        loop {
            match self.next(&mut receiver)? {
                Event::Placemark(placemark) => match placemarks::insert(&transaction, &placemark) {
                    Ok(_) => {
                        report.inserted += 1;
                        if report.inserted % self.progress_interval == 0 {
                            self.progress.update(
                                &format!("Importing {}", collection.name),
                                &format!("{} placemarks imported", report.inserted),
                            );
                        }
                    }
                    Err(err) if err.is_duplicate() => {
                        log::debug!("skipping duplicate placemark {:?}", placemark.name);
                        report.duplicates += 1;
                    }
                    Err(err) => return Err(err.into()),
                },
                Event::End { skipped } => {
                    report.skipped = skipped;
                    break;
                }
                Event::Failed(err) => return Err(err),
            }
        }

        // An import yielding nothing keeps the last good metadata.
        if report.inserted > 0 {
            let count = i64::try_from(report.inserted).unwrap_or(i64::MAX);
            collections::record_import(&transaction, collection.id, now_millis(), count)?;
            report.metadata_updated = true;
        }
        transaction.commit().map_err(|source| StoreError::Sqlite {
            operation: "commit import transaction",
            source,
        })?;
        Ok(report)
    }

    /// Next event, or an error if the import was cancelled or the producer
    /// stopped without a final event.
    fn next(&self, receiver: &mut mpsc::Receiver<Event>) -> Result<Event, ImportError> {
        let received = self.runtime.block_on(async {
            tokio::select! {
                biased;
                () = self.token.cancelled() => Err(ImportError::Cancelled),
                event = receiver.recv() => Ok(event),
            }
        })?;
        received.ok_or(ImportError::ProducerVanished)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
