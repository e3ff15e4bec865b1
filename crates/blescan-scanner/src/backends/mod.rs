//! Scan backends and their enum dispatch.
//!
//! Each backend drives exactly one of the two platform scan engines and is
//! the only code that calls it. Both share the same two-state session:
//!
//! - `Idle → Scanning` only through a successful start
//! - `Scanning → Idle` only through stop
//! - start while `Scanning` and stop while `Idle` are no-ops
//!
//! [`ScanBackend`] is the closed set of backends, chosen once when the
//! scanner is built.

pub mod legacy;
pub mod modern;

use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

pub use legacy::LegacyBackend;
pub use modern::ModernBackend;

use crate::config::ScannerConfig;
use crate::discovery::{DiscoveryHub, ScanEvent};
use crate::error::Result;
use crate::filter::{ScanFilter, ScanSettings};
use crate::lock_unpoisoned;
use crate::permission::PermissionGate;
use crate::types::{BackendKind, ScanState};

/// Contract shared by every scanning strategy.
pub trait ScanStrategy: Send + Sync {
    /// Start scanning without filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's preconditions do not hold or the
    /// platform refuses to start. The backend stays `Idle` on error.
    fn start(&self) -> Result<()>;

    /// Start scanning restricted to `filters` and tuned by `settings`.
    ///
    /// # Errors
    ///
    /// Same as [`start`](ScanStrategy::start).
    fn start_with(&self, filters: &[ScanFilter], settings: &ScanSettings) -> Result<()>;

    /// Stop scanning. Never fails.
    fn stop(&self);

    /// Current session state.
    fn state(&self) -> ScanState;

    fn is_scanning(&self) -> bool {
        self.state() == ScanState::Scanning
    }
}

/// State shared between a backend and the callback it hands to the platform.
#[derive(Debug)]
pub(crate) struct BackendShared {
    kind: BackendKind,
    state: Mutex<ScanState>,
    hub: Arc<DiscoveryHub>,
    debug: bool,
    accept_late_events: bool,
}

impl BackendShared {
    pub(crate) fn new(kind: BackendKind, config: &ScannerConfig) -> Arc<Self> {
        Arc::new(Self {
            kind,
            state: Mutex::new(ScanState::Idle),
            hub: Arc::new(DiscoveryHub::new(config.event_capacity)),
            debug: config.debug,
            accept_late_events: config.accept_late_events,
        })
    }

    pub(crate) fn hub(&self) -> &Arc<DiscoveryHub> {
        &self.hub
    }

    pub(crate) fn state(&self) -> ScanState {
        *lock_unpoisoned(&self.state)
    }

    /// Run `start_platform` unless already scanning.
    ///
    /// The state flips before the platform call so results delivered while
    /// the call is in progress are not taken for late ones; it flips back if
    /// the call fails.
    pub(crate) fn start(&self, start_platform: impl FnOnce() -> Result<()>) -> Result<()> {
        {
            let mut state = lock_unpoisoned(&self.state);
            if *state == ScanState::Scanning {
                return Ok(());
            }
            *state = ScanState::Scanning;
        }

        if let Err(e) = start_platform() {
            *lock_unpoisoned(&self.state) = ScanState::Idle;
            return Err(e);
        }

        if self.debug {
            debug!(backend = %self.kind, "startScan");
        }
        self.hub.publish(ScanEvent::ScanStarted(self.kind));
        Ok(())
    }

    /// Run `stop_platform` if scanning.
    pub(crate) fn stop(&self, stop_platform: impl FnOnce()) {
        {
            let mut state = lock_unpoisoned(&self.state);
            if *state == ScanState::Idle {
                return;
            }
            *state = ScanState::Idle;
        }

        stop_platform();

        if self.debug {
            debug!(backend = %self.kind, "stopScan");
        }
        self.hub.publish(ScanEvent::ScanStopped(self.kind));
    }

    /// Check if a result arriving now should be recorded.
    pub(crate) fn accepts_results(&self) -> bool {
        if self.accept_late_events || self.state() == ScanState::Scanning {
            return true;
        }
        trace!(backend = %self.kind, "Dropping result delivered after stop");
        false
    }
}

/// The closed set of scan backends.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use blescan_scanner::backends::{ScanBackend, ScanStrategy, LegacyBackend};
/// use blescan_scanner::mock::MockPlatform;
/// use blescan_scanner::{PlatformRevision, ScannerConfig};
///
/// let (platform, handle) = MockPlatform::new(PlatformRevision(18));
/// handle.grant_location_permission();
///
/// let platform = Arc::new(platform);
/// let backend = ScanBackend::Legacy(LegacyBackend::new(
///     platform.clone(),
///     platform,
///     &ScannerConfig::default(),
/// ));
///
/// backend.start().unwrap();
/// assert!(backend.is_scanning());
/// ```
#[derive(Debug)]
pub enum ScanBackend {
    /// Filter-less scanning for older revisions.
    Legacy(LegacyBackend),

    /// Filterable, location-gated scanning for newer revisions.
    Modern(ModernBackend),
}

impl ScanBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Legacy(_) => BackendKind::Legacy,
            Self::Modern(_) => BackendKind::Modern,
        }
    }

    pub fn hub(&self) -> &Arc<DiscoveryHub> {
        match self {
            Self::Legacy(backend) => backend.hub(),
            Self::Modern(backend) => backend.hub(),
        }
    }

    pub fn permission_gate(&self) -> &PermissionGate {
        match self {
            Self::Legacy(backend) => backend.permission_gate(),
            Self::Modern(backend) => backend.permission_gate(),
        }
    }
}

impl ScanStrategy for ScanBackend {
    fn start(&self) -> Result<()> {
        match self {
            Self::Legacy(backend) => backend.start(),
            Self::Modern(backend) => backend.start(),
        }
    }

    fn start_with(&self, filters: &[ScanFilter], settings: &ScanSettings) -> Result<()> {
        match self {
            Self::Legacy(backend) => backend.start_with(filters, settings),
            Self::Modern(backend) => backend.start_with(filters, settings),
        }
    }

    fn stop(&self) {
        match self {
            Self::Legacy(backend) => backend.stop(),
            Self::Modern(backend) => backend.stop(),
        }
    }

    fn state(&self) -> ScanState {
        match self {
            Self::Legacy(backend) => backend.state(),
            Self::Modern(backend) => backend.state(),
        }
    }
}

impl From<LegacyBackend> for ScanBackend {
    fn from(backend: LegacyBackend) -> Self {
        Self::Legacy(backend)
    }
}

impl From<ModernBackend> for ScanBackend {
    fn from(backend: ModernBackend) -> Self {
        Self::Modern(backend)
    }
}
