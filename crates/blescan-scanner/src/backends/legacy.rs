//! Backend for the filter-less scan engine of revisions 18-20.
//!
//! The engine reports every advertisement to a single callback and has no
//! filter or settings support. Location providers do not exist as a scan
//! precondition on these revisions, so only the permission is checked.

use std::fmt;
use std::sync::Arc;

use crate::backends::{BackendShared, ScanStrategy};
use crate::config::ScannerConfig;
use crate::discovery::DiscoveryHub;
use crate::error::{Result, ScanError};
use crate::filter::{ScanFilter, ScanSettings};
use crate::permission::PermissionGate;
use crate::platform::{LeScanCallback, LegacyScanApi, PlatformContext};
use crate::types::{Advertisement, BackendKind, LegacyRecord, ScanState};

/// Scan backend driving [`LegacyScanApi`].
pub struct LegacyBackend {
    api: Arc<dyn LegacyScanApi>,
    gate: PermissionGate,
    shared: Arc<BackendShared>,
    callback: LeScanCallback,
}

impl LegacyBackend {
    pub fn new(
        context: Arc<dyn PlatformContext>,
        api: Arc<dyn LegacyScanApi>,
        config: &ScannerConfig,
    ) -> Self {
        let shared = BackendShared::new(BackendKind::Legacy, config);

        let sink = shared.clone();
        let callback: LeScanCallback = Arc::new(move |advertisement: Advertisement| {
            if sink.accepts_results() {
                sink.hub()
                    .record_legacy(LegacyRecord::from_advertisement(advertisement));
            }
        });

        Self {
            api,
            gate: PermissionGate::new(context),
            shared,
            callback,
        }
    }

    pub fn hub(&self) -> &Arc<DiscoveryHub> {
        self.shared.hub()
    }

    pub fn permission_gate(&self) -> &PermissionGate {
        &self.gate
    }
}

impl ScanStrategy for LegacyBackend {
    fn start(&self) -> Result<()> {
        if !self.gate.is_location_permission_granted() {
            return Err(ScanError::PermissionDenied);
        }

        self.shared
            .start(|| self.api.start_le_scan(self.callback.clone()))
    }

    /// Same as [`start`](ScanStrategy::start); the engine cannot filter, so
    /// `filters` and `settings` are ignored.
    fn start_with(&self, _filters: &[ScanFilter], _settings: &ScanSettings) -> Result<()> {
        self.start()
    }

    fn stop(&self) {
        self.shared.stop(|| self.api.stop_le_scan());
    }

    fn state(&self) -> ScanState {
        self.shared.state()
    }
}

impl fmt::Debug for LegacyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyBackend")
            .field("state", &self.state())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
