//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use bleunlock_core::{Config, DeviceIdentityResolver, EventLog};

/// Handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Shared application state.
///
/// The resolver and the event log guard their own connections, so no outer
/// lock is needed.
#[derive(Debug)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// Device identity resolver over the system catalogs.
    pub resolver: DeviceIdentityResolver,
    /// Lock/unlock event log.
    pub event_log: EventLog,
    started_at: Instant,
}

impl AppState {
    /// Build the state from a validated configuration. Stores are not opened yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the event log time zone is invalid.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let calendar = config.event_log.calendar()?;
        let resolver = DeviceIdentityResolver::from_config(&config.devices);
        let event_log = EventLog::with_calendar(&config.event_log.path, calendar);

        Ok(Self {
            config,
            resolver,
            event_log,
            started_at: Instant::now(),
        })
    }

    /// Wrap in an [`Arc`] for the router.
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    /// Seconds since the state was built.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
