//! Lazily opened SQLite connections and column helpers.
//!
//! Every store used by bleunlock is an external file that may or may not exist.
//! [`LazyConnection`] opens it on first use and remembers the outcome for the
//! lifetime of the value: a store that failed to open stays unavailable, there
//! is no reconnect path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::{StoreError, StoreResult};

/// How a store file is opened.
///
/// Neither mode creates the file: a missing file is an unavailable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// System catalogs we only read from.
    ReadOnly,
    /// The event log, which we append to.
    ReadWrite,
}

impl AccessMode {
    fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            Self::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
            Self::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
        }
    }
}

/// Observable lifecycle of a [`LazyConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    /// Nothing has asked for the store yet.
    Uninitialized,
    /// The store opened successfully.
    Ready,
    /// The store could not be opened and will not be retried.
    Unavailable,
}

enum Slot {
    Uninitialized,
    Ready(Connection),
    Unavailable,
}

/// A connection handle that is opened at most once.
///
/// The handle is guarded by its own mutex since a single SQLite connection
/// must not be used from several threads at the same time.
pub struct LazyConnection {
    label: &'static str,
    path: PathBuf,
    mode: AccessMode,
    slot: Mutex<Slot>,
    open_attempts: AtomicUsize,
}

impl std::fmt::Debug for LazyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyConnection")
            .field("label", &self.label)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open_attempts", &self.open_attempts())
            .finish()
    }
}

impl LazyConnection {
    /// Create a handle for the store at `path`. Nothing is opened yet.
    pub fn new(label: &'static str, path: impl Into<PathBuf>, mode: AccessMode) -> Self {
        Self {
            label,
            path: path.into(),
            mode,
            slot: Mutex::new(Slot::Uninitialized),
            open_attempts: AtomicUsize::new(0),
        }
    }

    /// Short name used in log lines (e.g. `paired`).
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lifecycle state. Never triggers an open.
    #[must_use]
    pub fn state(&self) -> StoreState {
        match &*self.lock() {
            Slot::Uninitialized => StoreState::Uninitialized,
            Slot::Ready(_) => StoreState::Ready,
            Slot::Unavailable => StoreState::Unavailable,
        }
    }

    /// Number of times an open was attempted. Stays at one after the first use.
    #[must_use]
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::Relaxed)
    }

    /// Open the store if that has not been tried yet.
    ///
    /// Returns whether the store is usable.
    pub fn ensure_open(&self) -> bool {
        let mut slot = self.lock();
        self.open_if_needed(&mut slot);
        matches!(*slot, Slot::Ready(_))
    }

    /// Run `f` against the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store could not be opened,
    /// or whatever `f` returns.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut slot = self.lock();
        self.open_if_needed(&mut slot);
        match &*slot {
            Slot::Ready(conn) => f(conn),
            Slot::Uninitialized | Slot::Unavailable => Err(StoreError::Unavailable {
                store: self.label,
                path: self.path.clone(),
            }),
        }
    }

    fn open_if_needed(&self, slot: &mut Slot) {
        if !matches!(slot, Slot::Uninitialized) {
            return;
        }

        self.open_attempts.fetch_add(1, Ordering::Relaxed);
        *slot = match Connection::open_with_flags(&self.path, self.mode.flags()) {
            Ok(conn) => {
                debug!(store = self.label, path = %self.path.display(), "Store opened");
                Slot::Ready(conn)
            }
            Err(e) => {
                warn!(
                    store = self.label,
                    path = %self.path.display(),
                    error = %e,
                    "Store unavailable, lookups against it will return nothing"
                );
                Slot::Unavailable
            }
        };
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A panic inside a query leaves the connection itself intact.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read a text column, treating non-text values and blank strings as absent.
///
/// The returned value is trimmed.
///
/// # Errors
///
/// Returns an error if `index` is out of range for the row.
pub fn text_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<String>> {
    let value = match row.get_ref(index)? {
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes),
        _ => return Ok(None),
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Read an integer column, treating any other storage class as absent.
///
/// # Errors
///
/// Returns an error if `index` is out of range for the row.
pub fn integer_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<i64>> {
    match row.get_ref(index)? {
        ValueRef::Integer(n) => Ok(Some(n)),
        _ => Ok(None),
    }
}

/// Extract the MAC from an address of the form `<Kind> <MAC>`.
///
/// The token right after the first whitespace run is the MAC; anything after
/// it is ignored. A value without whitespace has no MAC.
///
/// ```
/// use bleunlock_core::store::parse_mac_address;
///
/// assert_eq!(
///     parse_mac_address("Random AA:BB:CC:DD:EE:FF").as_deref(),
///     Some("AA:BB:CC:DD:EE:FF")
/// );
/// assert_eq!(parse_mac_address("NoSpaceAddress"), None);
/// ```
#[must_use]
pub fn parse_mac_address(raw: &str) -> Option<String> {
    raw.split_whitespace().nth(1).map(str::to_string)
}
