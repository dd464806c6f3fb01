//! BLE device identity resolution.
//!
//! Platform Bluetooth APIs hand out device identifiers that change across
//! reboots and re-pairings. The OS Bluetooth stack keeps two SQLite catalogs
//! that map those identifiers to a friendly name and a hardware address:
//!
//! - `PairedDevices(Uuid, Name, Address, ResolvedAddress)`
//! - `OtherDevices(Uuid, Name, Address)`
//!
//! [`DeviceIdentityResolver`] consults the paired catalog first and only falls
//! back to the other catalog when the paired one has no row for the
//! identifier. Addresses are stored as `"<Kind> <MAC>"`, e.g.
//! `"Random AA:BB:CC:DD:EE:FF"`.

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::DevicesConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{parse_mac_address, text_column, AccessMode, LazyConnection, StoreState};

/// Display identity of a known device.
///
/// Both fields are independently optional. A value with both unset still means
/// "the device is known", unlike no value at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Jeffrey's iPhone",
    "mac_address": "AA:BB:CC:DD:EE:FF"
}))]
pub struct DeviceIdentity {
    /// Friendly name, unset when the catalog has none.
    #[schema(example = "Jeffrey's iPhone")]
    pub name: Option<String>,

    /// Colon-separated hardware address.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub mac_address: Option<String>,
}

impl DeviceIdentity {
    /// Build an identity from a name and a raw `"<Kind> <MAC>"` address.
    #[must_use]
    pub fn from_columns(name: Option<String>, raw_address: Option<&str>) -> Self {
        Self {
            name,
            mac_address: raw_address.and_then(parse_mac_address),
        }
    }
}

/// A source of device identities keyed by identifier.
///
/// Implemented by [`SqliteCatalog`]; tests substitute their own.
pub trait DeviceCatalog: Send + Sync {
    /// Short name used in log lines.
    fn label(&self) -> &'static str;

    /// Open the backing store if that has not been tried yet.
    fn ensure_open(&self) -> bool;

    /// Lifecycle state of the backing store.
    fn state(&self) -> StoreState;

    /// Look up the row for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store is unavailable or the query fails.
    fn find(&self, identifier: &str) -> StoreResult<Option<DeviceIdentity>>;
}

/// Which of the two system catalogs a [`SqliteCatalog`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// `PairedDevices`, which may carry a `ResolvedAddress`.
    Paired,
    /// `OtherDevices`, which only has `Address`.
    Other,
}

impl CatalogKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Paired => "paired",
            Self::Other => "other",
        }
    }

    const fn query(self) -> &'static str {
        match self {
            Self::Paired => {
                "SELECT Name, Address, ResolvedAddress FROM PairedDevices WHERE Uuid = ?1"
            }
            Self::Other => "SELECT Name, Address FROM OtherDevices WHERE Uuid = ?1",
        }
    }

    fn identity_from_row(self, row: &Row<'_>) -> rusqlite::Result<DeviceIdentity> {
        let name = text_column(row, 0)?;
        let address = text_column(row, 1)?;
        let raw = match self {
            // A resolved address wins even when it has no MAC token.
            Self::Paired => text_column(row, 2)?.or(address),
            Self::Other => address,
        };
        Ok(DeviceIdentity::from_columns(name, raw.as_deref()))
    }
}

/// A read-only system device catalog backed by SQLite.
#[derive(Debug)]
pub struct SqliteCatalog {
    kind: CatalogKind,
    store: LazyConnection,
}

impl SqliteCatalog {
    /// The paired-devices catalog at `path`.
    pub fn paired(path: impl Into<PathBuf>) -> Self {
        Self::new(CatalogKind::Paired, path)
    }

    /// The other-devices catalog at `path`.
    pub fn other(path: impl Into<PathBuf>) -> Self {
        Self::new(CatalogKind::Other, path)
    }

    fn new(kind: CatalogKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            store: LazyConnection::new(kind.label(), path, AccessMode::ReadOnly),
        }
    }

    /// Which table this catalog reads.
    #[must_use]
    pub const fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Number of open attempts so far (zero or one).
    #[must_use]
    pub fn open_attempts(&self) -> usize {
        self.store.open_attempts()
    }
}

impl DeviceCatalog for SqliteCatalog {
    fn label(&self) -> &'static str {
        self.kind.label()
    }

    fn ensure_open(&self) -> bool {
        self.store.ensure_open()
    }

    fn state(&self) -> StoreState {
        self.store.state()
    }

    fn find(&self, identifier: &str) -> StoreResult<Option<DeviceIdentity>> {
        let kind = self.kind;
        self.store.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(kind.query()).map_err(StoreError::Prepare)?;
            stmt.query_row(params![identifier], |row| kind.identity_from_row(row))
                .optional()
                .map_err(StoreError::Query)
        })
    }
}

/// State of both catalogs, for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CatalogAvailability {
    /// Paired-devices catalog.
    pub paired: StoreState,
    /// Other-devices catalog.
    pub other: StoreState,
}

/// Resolves unstable BLE identifiers to a name and MAC address.
#[derive(Debug)]
pub struct DeviceIdentityResolver<P = SqliteCatalog, O = SqliteCatalog> {
    paired: P,
    other: O,
}

impl DeviceIdentityResolver {
    /// Resolver over the two SQLite catalogs at the given paths.
    pub fn new(paired_db: impl Into<PathBuf>, other_db: impl Into<PathBuf>) -> Self {
        Self::with_catalogs(SqliteCatalog::paired(paired_db), SqliteCatalog::other(other_db))
    }

    /// Resolver over the catalogs named in `config`.
    #[must_use]
    pub fn from_config(config: &DevicesConfig) -> Self {
        Self::new(&config.paired_db, &config.other_db)
    }
}

impl<P: DeviceCatalog, O: DeviceCatalog> DeviceIdentityResolver<P, O> {
    /// Resolver over arbitrary catalogs.
    pub const fn with_catalogs(paired: P, other: O) -> Self {
        Self { paired, other }
    }

    /// The paired-devices catalog.
    pub const fn paired(&self) -> &P {
        &self.paired
    }

    /// The other-devices catalog.
    pub const fn other(&self) -> &O {
        &self.other
    }

    /// Open both catalogs if that has not been tried yet.
    pub fn ensure_open(&self) {
        self.paired.ensure_open();
        self.other.ensure_open();
    }

    /// Lifecycle state of both catalogs. Does not open them.
    pub fn availability(&self) -> CatalogAvailability {
        CatalogAvailability {
            paired: self.paired.state(),
            other: self.other.state(),
        }
    }

    /// Best-known identity for `identifier`.
    ///
    /// A paired row is returned as soon as it exists, however sparse; the
    /// other catalog is only read when there is no paired row or the paired
    /// catalog cannot be queried. Returns `None` when neither knows the device.
    pub fn resolve(&self, identifier: &str) -> Option<DeviceIdentity> {
        self.ensure_open();

        if let Some(identity) = consult(&self.paired, identifier) {
            debug!(identifier, catalog = self.paired.label(), "Device resolved");
            return Some(identity);
        }

        let identity = consult(&self.other, identifier);
        if identity.is_some() {
            debug!(identifier, catalog = self.other.label(), "Device resolved");
        } else {
            debug!(identifier, "Device not in any catalog");
        }
        identity
    }
}

fn consult(catalog: &impl DeviceCatalog, identifier: &str) -> Option<DeviceIdentity> {
    match catalog.find(identifier) {
        Ok(found) => found,
        Err(e @ StoreError::Unavailable { .. }) => {
            debug!(catalog = catalog.label(), error = %e, "Catalog skipped");
            None
        }
        Err(e) => {
            warn!(catalog = catalog.label(), identifier, error = %e, "Catalog lookup failed");
            None
        }
    }
}
