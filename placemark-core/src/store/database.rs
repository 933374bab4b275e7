//! Reference-counted lifecycle for one SQLite database file.
//!
//! A [`DatabaseHandle`] is in exactly one of three states:
//!
//! - `Closed`: no connection exists.
//! - `Open(count)`: a shared connection is live and `count` leases hold it.
//! - `Locked`: the file is held exclusively, typically for a raw copy.
//!
//! Leases nest; the connection is dropped when the last one is released.
//! Locking requires `Closed`, and opening while `Locked` is forbidden. Both
//! violations are programming errors and panic immediately.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;
use rusqlite::Connection;

use super::{StoreError, initialise_schema};

enum HandleState {
    Closed,
    Open {
        connection: Arc<Mutex<Connection>>,
        count: usize,
    },
    Locked,
}

impl HandleState {
    const fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open { .. } => "open",
            Self::Locked => "locked",
        }
    }
}

/// Shared entry point to one database file.
pub struct DatabaseHandle {
    path: PathBuf,
    state: Mutex<HandleState>,
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("path", &self.path)
            .field("state", &self.lock_state().name())
            .finish()
    }
}

impl DatabaseHandle {
    /// Create a closed handle for the database at `path`.
    ///
    /// Nothing touches the filesystem until the first [`DatabaseHandle::open`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(HandleState::Closed),
        }
    }

    /// Location of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the underlying file, used as its archive entry name.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Acquire a lease on the shared connection, opening it if needed.
    ///
    /// The schema is created on first open of a new file.
    ///
    /// # Panics
    ///
    /// Panics if the handle is currently locked.
    pub fn open(&self) -> Result<OpenDatabase<'_>, StoreError> {
        let mut state = self.lock_state();
        let connection = match &mut *state {
            HandleState::Locked => {
                panic!("database {:?} opened while locked", self.path);
            }
            HandleState::Open { connection, count } => {
                *count += 1;
                Arc::clone(connection)
            }
            HandleState::Closed => {
                let connection = Arc::new(Mutex::new(self.connect()?));
                *state = HandleState::Open {
                    connection: Arc::clone(&connection),
                    count: 1,
                };
                debug!("opened database {:?}", self.path);
                connection
            }
        };
        Ok(OpenDatabase {
            handle: self,
            connection: Some(connection),
        })
    }

    /// Take exclusive ownership of the underlying file.
    ///
    /// # Panics
    ///
    /// Panics unless the handle is closed: locking while any lease is alive,
    /// or locking twice, is a programming error.
    pub fn lock(&self) -> LockedDatabase<'_> {
        let mut state = self.lock_state();
        match &*state {
            HandleState::Closed => {
                *state = HandleState::Locked;
                debug!("locked database {:?}", self.path);
                LockedDatabase { handle: self }
            }
            other => panic!(
                "database {:?} locked while {}; every lease must be released first",
                self.path,
                other.name()
            ),
        }
    }

    /// Report whether no lease or lock is held.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(&*self.lock_state(), HandleState::Closed)
    }

    /// Number of live leases.
    #[must_use]
    pub fn open_count(&self) -> usize {
        match &*self.lock_state() {
            HandleState::Open { count, .. } => *count,
            HandleState::Closed | HandleState::Locked => 0,
        }
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let mut connection =
            Connection::open(&self.path).map_err(|source| StoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            })?;
        initialise_schema(&mut connection)?;
        Ok(connection)
    }

    fn release(&self) {
        let mut state = self.lock_state();
        match &mut *state {
            HandleState::Open { count, .. } if *count > 1 => *count -= 1,
            HandleState::Open { .. } => {
                *state = HandleState::Closed;
                debug!("closed database {:?}", self.path);
            }
            other => panic!(
                "database {:?} released while {}",
                self.path,
                other.name()
            ),
        }
    }

    fn unlock(&self) {
        let mut state = self.lock_state();
        if matches!(&*state, HandleState::Locked) {
            *state = HandleState::Closed;
            debug!("unlocked database {:?}", self.path);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live lease on a [`DatabaseHandle`]; releases it on drop.
pub struct OpenDatabase<'a> {
    handle: &'a DatabaseHandle,
    connection: Option<Arc<Mutex<Connection>>>,
}

impl fmt::Debug for OpenDatabase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenDatabase")
            .field("path", &self.handle.path)
            .finish_non_exhaustive()
    }
}

impl OpenDatabase<'_> {
    /// Borrow the shared connection.
    ///
    /// Leases on the same handle serialise through this guard.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        match &self.connection {
            Some(connection) => connection.lock().unwrap_or_else(PoisonError::into_inner),
            None => unreachable!("connection is only taken during drop"),
        }
    }
}

impl Drop for OpenDatabase<'_> {
    fn drop(&mut self) {
        // The connection must be gone before the state can reach `Closed`.
        drop(self.connection.take());
        self.handle.release();
    }
}

/// Exclusive hold on a [`DatabaseHandle`]'s file; unlocks on drop.
pub struct LockedDatabase<'a> {
    handle: &'a DatabaseHandle,
}

impl fmt::Debug for LockedDatabase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedDatabase")
            .field("path", &self.handle.path)
            .finish()
    }
}

impl LockedDatabase<'_> {
    /// Location of the locked file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Base name of the locked file.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.handle.file_name()
    }

    /// Delete the underlying file so the next open starts from an empty
    /// schema. A missing file is not an error.
    pub fn reset(&self) -> io::Result<()> {
        match std::fs::remove_file(self.path()) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

impl Drop for LockedDatabase<'_> {
    fn drop(&mut self) {
        self.handle.unlock();
    }
}
