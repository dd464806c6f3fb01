//! Lock/unlock audit log.
//!
//! A best-effort append-only record of when the screen was locked or
//! unlocked. Each row carries the epoch time plus two derived strings: a
//! `yyyyMMdd` day key used for lookups and a `yyyyMMdd HH:mm:ss` label kept
//! for display.
//!
//! Writes never fail from the caller's point of view. A missing log file or a
//! failed insert is logged and otherwise ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::error::{Result, StoreError, StoreResult};
use crate::store::{integer_column, text_column, AccessMode, LazyConnection, StoreState};

/// `strftime` pattern of the day key.
pub const DAY_KEY_FORMAT: &str = "%Y%m%d";

/// `strftime` pattern of the display label.
pub const TIMESTAMP_LABEL_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Schema of the `Log` table.
///
/// The log is normally provisioned outside bleunlock; see [`create_log_store`].
pub const LOG_TABLE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS Log (
    ID          INTEGER PRIMARY KEY AUTOINCREMENT,
    Time        INT     NOT NULL,
    LockType    TEXT    NOT NULL,
    PrettyTime  TEXT    NOT NULL,
    PrettyDate  TEXT    NOT NULL
)";

const INSERT_EVENT: &str =
    "INSERT INTO Log (Time, LockType, PrettyTime, PrettyDate) VALUES (?1, ?2, ?3, ?4)";

const SELECT_BY_DAY: &str = "SELECT Time, LockType, PrettyTime, PrettyDate FROM Log
     WHERE PrettyTime = ?1
     ORDER BY ID
     LIMIT 1";

/// Kind of screen-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// The screen was locked.
    Lock,
    /// The screen was unlocked.
    Unlock,
}

impl LockKind {
    /// Label stored in the `LockType` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored label that is neither `lock` nor `unlock`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lock kind '{0}'")]
pub struct UnknownLockKind(pub String);

impl FromStr for LockKind {
    type Err = UnknownLockKind;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lock" => Ok(Self::Lock),
            "unlock" => Ok(Self::Unlock),
            other => Err(UnknownLockKind(other.to_string())),
        }
    }
}

/// One row of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "epoch_time": 1_736_926_200,
    "kind": "unlock",
    "day_key": "20250115",
    "timestamp_label": "20250115 07:30:00"
}))]
pub struct EventRecord {
    /// Seconds since the Unix epoch.
    #[schema(example = 1_736_926_200)]
    pub epoch_time: i64,

    /// Unset when the stored label is not a known kind.
    pub kind: Option<LockKind>,

    /// `yyyyMMdd` bucket the event was filed under.
    #[schema(example = "20250115")]
    pub day_key: String,

    /// `yyyyMMdd HH:mm:ss` display label.
    #[schema(example = "20250115 07:30:00")]
    pub timestamp_label: Option<String>,
}

/// Time zone used to turn an instant into a day key and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    /// The system's local time zone.
    #[default]
    Local,
    /// A fixed IANA zone.
    Zone(Tz),
}

impl Calendar {
    fn format(self, at: DateTime<Utc>, pattern: &str) -> String {
        match self {
            Self::Local => at.with_timezone(&chrono::Local).format(pattern).to_string(),
            Self::Zone(tz) => at.with_timezone(&tz).format(pattern).to_string(),
        }
    }

    /// `yyyyMMdd` key of the calendar day containing `at`.
    #[must_use]
    pub fn day_key(self, at: DateTime<Utc>) -> String {
        self.format(at, DAY_KEY_FORMAT)
    }

    /// `yyyyMMdd HH:mm:ss` label of `at`.
    #[must_use]
    pub fn timestamp_label(self, at: DateTime<Utc>) -> String {
        self.format(at, TIMESTAMP_LABEL_FORMAT)
    }
}

/// The lock/unlock event log.
///
/// Opens its store on first use and keeps the handle for its whole lifetime.
#[derive(Debug)]
pub struct EventLog {
    store: LazyConnection,
    calendar: Calendar,
}

impl EventLog {
    /// Create a log backed by the SQLite file at `path`, bucketing days in the
    /// local time zone.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_calendar(path, Calendar::Local)
    }

    /// Create a log with an explicit calendar.
    pub fn with_calendar(path: impl Into<PathBuf>, calendar: Calendar) -> Self {
        Self {
            store: LazyConnection::new("event log", path, AccessMode::ReadWrite),
            calendar,
        }
    }

    /// Calendar used to derive day keys.
    #[must_use]
    pub const fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Lifecycle state of the store. Does not open it.
    #[must_use]
    pub fn state(&self) -> StoreState {
        self.store.state()
    }

    /// Whether the store has been opened successfully.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.store.state() == StoreState::Ready
    }

    /// Number of open attempts so far (zero or one).
    #[must_use]
    pub fn open_attempts(&self) -> usize {
        self.store.open_attempts()
    }

    /// Open the store now rather than on first use.
    pub fn prepare(&self) -> bool {
        self.store.ensure_open()
    }

    /// Day key for `at` in this log's calendar.
    #[must_use]
    pub fn day_key_for(&self, at: DateTime<Utc>) -> String {
        self.calendar.day_key(at)
    }

    /// Display label for `at` in this log's calendar.
    #[must_use]
    pub fn timestamp_label_for(&self, at: DateTime<Utc>) -> String {
        self.calendar.timestamp_label(at)
    }

    /// Record that the screen was unlocked at `now`.
    pub fn record_unlock(&self, now: DateTime<Utc>) {
        self.record(LockKind::Unlock, now);
    }

    /// Record that the screen was locked at `now`.
    pub fn record_lock(&self, now: DateTime<Utc>) {
        self.record(LockKind::Lock, now);
    }

    /// Record an event of `kind` at `now`. Failures are logged, not returned.
    ///
    /// Returns whether a row was written. An open store whose `Log` table is
    /// missing or malformed still yields `false`.
    pub fn record(&self, kind: LockKind, now: DateTime<Utc>) -> bool {
        match self.insert(kind, now) {
            Ok(_) => true,
            Err(e @ StoreError::Unavailable { .. }) => {
                debug!(kind = %kind, error = %e, "Event not recorded");
                false
            }
            Err(e) => {
                error!(kind = %kind, error = %e, "Could not insert event");
                false
            }
        }
    }

    fn insert(&self, kind: LockKind, now: DateTime<Utc>) -> StoreResult<i64> {
        let day_key = self.day_key_for(now);
        let label = self.timestamp_label_for(now);

        self.store.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(INSERT_EVENT).map_err(StoreError::Prepare)?;
            stmt.execute(params![now.timestamp(), kind.as_str(), day_key, label])
                .map_err(StoreError::Query)?;
            let id = conn.last_insert_rowid();
            info!(id, kind = %kind, day_key = %day_key, "Event recorded");
            Ok(id)
        })
    }

    /// First event filed under today's day key.
    #[must_use]
    pub fn lookup_today(&self) -> Option<EventRecord> {
        self.lookup(None)
    }

    /// First event filed under `day_key`, or today's key when `None`.
    ///
    /// "First" is the earliest inserted row for that day. Returns `None` when
    /// the store is unavailable, the query fails, or nothing matches.
    #[must_use]
    pub fn lookup(&self, day_key: Option<&str>) -> Option<EventRecord> {
        let day_key = day_key.map_or_else(|| self.day_key_for(Utc::now()), str::to_string);

        match self.find_first(&day_key) {
            Ok(record) => record,
            Err(e @ StoreError::Unavailable { .. }) => {
                debug!(day_key = %day_key, error = %e, "Event lookup skipped");
                None
            }
            Err(e) => {
                warn!(day_key = %day_key, error = %e, "Event lookup failed");
                None
            }
        }
    }

    fn find_first(&self, day_key: &str) -> StoreResult<Option<EventRecord>> {
        self.store.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(SELECT_BY_DAY).map_err(StoreError::Prepare)?;
            let row = stmt
                .query_row(params![day_key], |row| {
                    Ok((
                        integer_column(row, 0)?,
                        text_column(row, 1)?,
                        text_column(row, 2)?,
                        text_column(row, 3)?,
                    ))
                })
                .optional()
                .map_err(StoreError::Query)?;

            let Some((time, lock_type, pretty_time, pretty_date)) = row else {
                return Ok(None);
            };

            // Rows without a usable time or day key are not events we can report.
            let (Some(epoch_time), Some(day_key)) = (time, pretty_time) else {
                debug!(day_key, "Matching row has unusable Time or PrettyTime");
                return Ok(None);
            };

            let kind = lock_type.and_then(|label| match label.parse::<LockKind>() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    debug!(error = %e, "Leaving event kind unset");
                    None
                }
            });

            Ok(Some(EventRecord {
                epoch_time,
                kind,
                day_key,
                timestamp_label: pretty_date,
            }))
        })
    }
}

/// Create the log file and its `Log` table if they do not exist.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the schema
/// cannot be applied.
pub fn create_log_store(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )
    .map_err(|e| {
        warn!(path = %path.display(), error = %e, "Could not create event log");
        StoreError::Unavailable {
            store: "event log",
            path: path.to_path_buf(),
        }
    })?;
    conn.execute_batch(LOG_TABLE_SCHEMA)
        .map_err(StoreError::Query)?;
    info!(path = %path.display(), "Event log provisioned");
    Ok(())
}
