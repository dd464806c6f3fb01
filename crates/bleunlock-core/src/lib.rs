//! # bleunlock-core
//!
//! Core logic for bleunlock, which locks and unlocks a computer based on the
//! proximity of a Bluetooth Low Energy device.
//!
//! This crate provides:
//! - Resolution of unstable BLE identifiers to a stable name and MAC address,
//!   using the catalogs maintained by the OS Bluetooth stack
//! - A best-effort lock/unlock event log bucketed by calendar day
//! - Configuration management
//!
//! ## Architecture
//!
//! - [`identity`] - Two-tier lookup over the paired and other device catalogs
//! - [`event_log`] - Append and day-key lookup over the `Log` table
//! - [`store`] - Lazily opened SQLite handles and column helpers
//! - [`config`] - Configuration loading, saving, and validation
//! - [`error`] - Store error taxonomy and the unified error type

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event_log;
pub mod identity;
pub mod store;

// Re-export primary types for convenience
pub use config::{
    default_config_path, default_data_dir, Config, ConfigError, ConfigResult, DevicesConfig,
    EventLogConfig, LoggingConfig, ServerConfig,
};
pub use error::{BleUnlockError, Result, StoreError, StoreResult};
pub use event_log::{create_log_store, Calendar, EventLog, EventRecord, LockKind};
pub use identity::{
    CatalogAvailability, DeviceCatalog, DeviceIdentity, DeviceIdentityResolver, SqliteCatalog,
};
pub use store::{parse_mac_address, StoreState};
