//! Backup and restore of raw database files as a ZIP archive.
//!
//! Each store is locked for the duration of its copy, so no lease can be
//! mid-transaction while its file is read or overwritten. The lock is an
//! RAII guard and is released even when the copy fails.

use std::{
    io,
    path::{Path, PathBuf},
};

use camino::{Utf8Path, Utf8PathBuf};
use placemark_core::store::{DatabaseHandle, LockedDatabase};
use thiserror::Error;
use zip::{CompressionMethod, ZipArchive, ZipWriter, result::ZipError, write::SimpleFileOptions};

/// Errors raised while creating or restoring an archive.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArchiveError {
    /// The archive could not be opened for reading.
    #[error("failed to open archive {path}")]
    Open {
        /// Archive location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The archive could not be created.
    #[error("failed to create archive {path}")]
    Create {
        /// Archive location.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Copying a store file into or out of the archive failed.
    #[error("failed to copy store file {name}")]
    Copy {
        /// Entry and file base name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The archive is malformed or could not be written.
    #[error("invalid archive {path}")]
    Zip {
        /// Archive location.
        path: Utf8PathBuf,
        /// Error reported by the ZIP codec.
        #[source]
        source: ZipError,
    },
    /// A store lives at a path that is not valid UTF-8.
    #[error("store path {path:?} is not valid UTF-8")]
    NonUtf8Path {
        /// Offending path.
        path: PathBuf,
    },
}

/// Creates and restores archives over a fixed, ordered set of stores.
#[derive(Debug)]
pub struct ArchiveManager<'a> {
    handles: Vec<&'a DatabaseHandle>,
}

impl<'a> ArchiveManager<'a> {
    /// Manager for `handles`, archived in the given order.
    #[must_use]
    pub const fn new(handles: Vec<&'a DatabaseHandle>) -> Self {
        Self { handles }
    }

    /// Write one deflated entry per existing store file to `destination`.
    ///
    /// Entries are named by the store file's base name. Stores whose file
    /// does not exist yet are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be written or a store file
    /// cannot be read.
    ///
    /// # Panics
    ///
    /// Panics if any store has a live lease.
    pub fn create(&self, destination: &Utf8Path) -> Result<Vec<String>, ArchiveError> {
        let file = placemark_fs::create_file(destination).map_err(|source| ArchiveError::Create {
            path: destination.to_owned(),
            source,
        })?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut archived = Vec::new();
        for handle in &self.handles {
            let locked = handle.lock();
            let path = utf8(locked.path())?;
            let name = locked.file_name();
            let exists = placemark_fs::is_file(path).map_err(|source| copy_error(&name, source))?;
            if !exists {
                log::debug!("store {name} has no file yet; leaving it out of {destination}");
                continue;
            }
            let mut source = placemark_fs::open_file(path).map_err(|source| copy_error(&name, source))?;
            writer
                .start_file(name.as_str(), options)
                .map_err(|source| zip_error(destination, source))?;
            io::copy(&mut source, &mut writer).map_err(|source| copy_error(&name, source))?;
            log::debug!("archived store {name}");
            archived.push(name);
        }
        writer.finish().map_err(|source| zip_error(destination, source))?;
        log::info!("wrote {} stores to {destination}", archived.len());
        Ok(archived)
    }

    /// Overwrite each store whose file name matches an entry in `source`.
    ///
    /// Stores without a matching entry are left untouched. Returns the names
    /// of the restored stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or a store file cannot
    /// be written. A store whose copy failed may be left partially written.
    ///
    /// # Panics
    ///
    /// Panics if any store has a live lease.
    pub fn restore(&self, source: &Utf8Path) -> Result<Vec<String>, ArchiveError> {
        let file = placemark_fs::open_file(source).map_err(|err| ArchiveError::Open {
            path: source.to_owned(),
            source: err,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|err| zip_error(source, err))?;
        let mut restored = Vec::new();
        for handle in &self.handles {
            let locked = handle.lock();
            if restore_one(&mut archive, &locked, source)? {
                restored.push(locked.file_name());
            }
        }
        log::info!("restored {} stores from {source}", restored.len());
        Ok(restored)
    }
}

fn restore_one(
    archive: &mut ZipArchive<std::fs::File>,
    locked: &LockedDatabase<'_>,
    source: &Utf8Path,
) -> Result<bool, ArchiveError> {
    let name = locked.file_name();
    let mut entry = match archive.by_name(&name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            log::debug!("{source} has no entry for store {name}; leaving it unchanged");
            return Ok(false);
        }
        Err(err) => return Err(zip_error(source, err)),
    };
    let path = utf8(locked.path())?;
    let mut target = placemark_fs::create_file(path).map_err(|err| copy_error(&name, err))?;
    io::copy(&mut entry, &mut target).map_err(|err| copy_error(&name, err))?;
    target.sync_all().map_err(|err| copy_error(&name, err))?;
    log::debug!("restored store {name}");
    Ok(true)
}

fn utf8(path: &Path) -> Result<&Utf8Path, ArchiveError> {
    Utf8Path::from_path(path).ok_or_else(|| ArchiveError::NonUtf8Path {
        path: path.to_path_buf(),
    })
}

fn copy_error(name: &str, source: io::Error) -> ArchiveError {
    ArchiveError::Copy {
        name: name.to_owned(),
        source,
    }
}

fn zip_error(path: &Utf8Path, source: ZipError) -> ArchiveError {
    ArchiveError::Zip {
        path: path.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placemark_core::{PlacemarkCollection, store::collections};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
        first: DatabaseHandle,
        second: DatabaseHandle,
    }

    impl Workspace {
        fn path(&self, name: &str) -> Utf8PathBuf {
            Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf-8 temp path")
        }
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("temp dir");
        let first = DatabaseHandle::new(dir.path().join("stores").join("placemarks.db"));
        let second = DatabaseHandle::new(dir.path().join("stores").join("collections.db"));
        std::fs::create_dir_all(dir.path().join("stores")).expect("stores dir");
        Workspace { dir, first, second }
    }

    fn add_collection(handle: &DatabaseHandle, name: &str) {
        let lease = handle.open().expect("open");
        let connection = lease.connection();
        let collection = PlacemarkCollection::new(name, "/data/x.gpx").expect("collection");
        collections::insert(&connection, &collection).expect("insert");
    }

    fn collection_names(handle: &DatabaseHandle) -> Vec<String> {
        let lease = handle.open().expect("open");
        let connection = lease.connection();
        collections::list(&connection)
            .expect("list")
            .into_iter()
            .map(|collection| collection.name)
            .collect()
    }

    #[rstest]
    fn restore_reverts_every_archived_store(workspace: Workspace) {
        add_collection(&workspace.first, "Alpha");
        add_collection(&workspace.second, "Beta");
        let archive = workspace.path("backup.zip");
        let manager = ArchiveManager::new(vec![&workspace.first, &workspace.second]);

        let archived = manager.create(&archive).expect("create archive");
        assert_eq!(archived, ["placemarks.db", "collections.db"]);

        add_collection(&workspace.first, "Gamma");
        let restored = manager.restore(&archive).expect("restore archive");
        assert_eq!(restored, ["placemarks.db", "collections.db"]);
        assert_eq!(collection_names(&workspace.first), ["Alpha"]);
        assert_eq!(collection_names(&workspace.second), ["Beta"]);
        assert!(workspace.first.is_closed());
        assert!(workspace.second.is_closed());
    }

    #[rstest]
    fn stores_without_an_entry_are_left_alone(workspace: Workspace) {
        add_collection(&workspace.first, "Alpha");
        let archive = workspace.path("partial.zip");
        ArchiveManager::new(vec![&workspace.first])
            .create(&archive)
            .expect("create archive");

        add_collection(&workspace.second, "Beta");
        let restored = ArchiveManager::new(vec![&workspace.first, &workspace.second])
            .restore(&archive)
            .expect("restore archive");
        assert_eq!(restored, ["placemarks.db"]);
        assert_eq!(collection_names(&workspace.second), ["Beta"]);
    }

    #[rstest]
    fn missing_store_files_are_not_archived(workspace: Workspace) {
        add_collection(&workspace.second, "Beta");
        let archive = workspace.path("backup.zip");
        let archived = ArchiveManager::new(vec![&workspace.first, &workspace.second])
            .create(&archive)
            .expect("create archive");
        assert_eq!(archived, ["collections.db"]);
    }

    #[rstest]
    fn failures_release_the_lock(workspace: Workspace) {
        let bogus = workspace.path("bogus.zip");
        std::fs::write(&bogus, b"not a zip").expect("write bogus archive");
        let manager = ArchiveManager::new(vec![&workspace.first]);
        let err = manager.restore(&bogus).expect_err("invalid archive");
        assert!(matches!(err, ArchiveError::Zip { .. }));

        add_collection(&workspace.first, "Alpha");
        let archive = workspace.path("backup.zip");
        manager.create(&archive).expect("create archive");
        let blocked = DatabaseHandle::new(workspace.dir.path().join("placemarks.db"));
        std::fs::create_dir(blocked.path()).expect("directory in the way");
        let err = ArchiveManager::new(vec![&blocked])
            .restore(&archive)
            .expect_err("target is a directory");
        assert!(matches!(err, ArchiveError::Copy { .. }));
        assert!(blocked.is_closed());
        assert!(workspace.first.is_closed());
    }
}
