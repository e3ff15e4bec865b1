//! Backend for the filterable scan engine of revision 21 and above.
//!
//! Results only flow while location is available, so every start checks
//! the permission and then the location service before the engine is
//! touched. Filters and settings are handed to the engine untouched.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::backends::{BackendShared, ScanStrategy};
use crate::config::ScannerConfig;
use crate::discovery::{DiscoveryHub, ScanEvent};
use crate::error::{Result, ScanError};
use crate::filter::{ScanFilter, ScanSettings};
use crate::permission::PermissionGate;
use crate::platform::{ModernScanApi, PlatformContext, ScanCallback};
use crate::types::{Advertisement, BackendKind, CallbackType, ModernRecord, ScanState};

/// Scan backend driving [`ModernScanApi`].
pub struct ModernBackend {
    api: Arc<dyn ModernScanApi>,
    gate: PermissionGate,
    shared: Arc<BackendShared>,
    callback: Arc<dyn ScanCallback>,
}

impl ModernBackend {
    pub fn new(
        context: Arc<dyn PlatformContext>,
        api: Arc<dyn ModernScanApi>,
        config: &ScannerConfig,
    ) -> Self {
        let shared = BackendShared::new(BackendKind::Modern, config);
        let callback = Arc::new(ModernSink {
            shared: shared.clone(),
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

    fn check_location(&self) -> Result<()> {
        if !self.gate.is_location_permission_granted() {
            return Err(ScanError::PermissionDenied);
        }
        if !self.gate.is_location_service_enabled() {
            return Err(ScanError::LocationServiceDisabled);
        }
        Ok(())
    }
}

impl ScanStrategy for ModernBackend {
    fn start(&self) -> Result<()> {
        self.check_location()?;
        self.shared
            .start(|| self.api.start_scan(self.callback.clone()))
    }

    fn start_with(&self, filters: &[ScanFilter], settings: &ScanSettings) -> Result<()> {
        self.check_location()?;
        self.shared.start(|| {
            self.api
                .start_scan_filtered(filters, settings, self.callback.clone())
        })
    }

    fn stop(&self) {
        self.shared.stop(|| self.api.stop_scan());
    }

    fn state(&self) -> ScanState {
        self.shared.state()
    }
}

impl fmt::Debug for ModernBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModernBackend")
            .field("state", &self.state())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Callback handed to the platform engine.
struct ModernSink {
    shared: Arc<BackendShared>,
}

impl ScanCallback for ModernSink {
    fn on_scan_result(&self, callback_type: CallbackType, result: Advertisement) {
        if self.shared.accepts_results() {
            self.shared
                .hub()
                .record_modern(ModernRecord::from_advertisement(callback_type, result));
        }
    }

    fn on_batch_scan_results(&self, results: Vec<Advertisement>) {
        if !self.shared.accepts_results() {
            return;
        }
        for result in results {
            self.shared
                .hub()
                .record_modern(ModernRecord::from_advertisement(CallbackType::Batch, result));
        }
    }

    fn on_scan_failed(&self, error_code: i32) {
        warn!(error_code, "Platform scan failed");
        self.shared.hub().publish(ScanEvent::ScanFailed { error_code });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPlatform, MockPlatformHandle};
    use crate::platform::LocationProvider;
    use crate::types::{DeviceRecord, PlatformRevision};
    use crate::filter::ScanMode;
    use rstest::rstest;

    fn backend(revision: u32) -> (ModernBackend, MockPlatformHandle) {
        let (platform, handle) = MockPlatform::new(PlatformRevision(revision));
        let platform = Arc::new(platform);
        let backend = ModernBackend::new(platform.clone(), platform, &ScannerConfig::default());
        (backend, handle)
    }

    #[rstest]
    #[case::nothing(false, false, Some(ScanError::PermissionDenied))]
    #[case::service_only(false, true, Some(ScanError::PermissionDenied))]
    #[case::permission_only(true, false, Some(ScanError::LocationServiceDisabled))]
    #[case::both(true, true, None)]
    fn test_start_gating(
        #[case] granted: bool,
        #[case] service: bool,
        #[case] expected: Option<ScanError>,
    ) {
        let (backend, handle) = backend(23);
        if granted {
            handle.grant_location_permission();
        }
        if !service {
            handle.disable_all_providers();
        }

        let result = backend.start();
        assert_eq!(result.err(), expected);
        assert_eq!(backend.is_scanning(), expected.is_none());

        let filtered = backend.start_with(&[ScanFilter::new()], &ScanSettings::default());
        assert_eq!(filtered.err(), expected);
    }

    #[test]
    fn test_gating_happens_before_platform_call() {
        let (backend, handle) = backend(23);

        assert!(backend.start().unwrap_err().is_location_unavailable());
        assert_eq!(handle.start_calls(), 0);
    }

    #[test]
    fn test_location_service_not_required_before_marshmallow() {
        let (backend, handle) = backend(21);
        handle.grant_location_permission();
        handle.disable_all_providers();

        assert!(backend.start().is_ok());
    }

    #[test]
    fn test_single_provider_is_enough() {
        let (backend, handle) = backend(28);
        handle.grant_location_permission();
        handle.disable_all_providers();
        handle.set_provider_enabled(LocationProvider::Passive, true);

        assert!(backend.start().is_ok());
    }

    #[test]
    fn test_unfiltered_start_passes_no_filters() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();

        backend.start().unwrap();
        assert!(handle.is_scanning());
        assert_eq!(handle.active_filters(), None);
        assert_eq!(handle.active_settings(), None);
    }

    #[test]
    fn test_filters_and_settings_passed_verbatim() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();

        let filters = vec![
            ScanFilter::new().with_device_name("Scale"),
            ScanFilter::new().with_device_address("AA:BB:CC:DD:EE:09"),
        ];
        let settings = ScanSettings::new()
            .with_scan_mode(ScanMode::LowLatency)
            .with_callback_type(CallbackType::FirstMatch);

        backend.start_with(&filters, &settings).unwrap();

        assert_eq!(handle.active_filters(), Some(filters));
        assert_eq!(handle.active_settings(), Some(settings));
    }

    #[test]
    fn test_empty_filters_behave_as_unfiltered() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();

        backend.start_with(&[], &ScanSettings::default()).unwrap();
        assert!(handle.advertise(Advertisement::new("AA:BB:CC:DD:EE:01", -60)));
        assert_eq!(backend.hub().registry().len(), 1);
    }

    #[test]
    fn test_callback_type_recorded() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();
        backend.start().unwrap();

        handle.advertise_with_type(
            CallbackType::FirstMatch,
            Advertisement::new("AA:BB:CC:DD:EE:01", -60),
        );

        match backend.hub().registry().get("AA:BB:CC:DD:EE:01") {
            Some(DeviceRecord::Modern(record)) => {
                assert_eq!(record.callback_type, CallbackType::FirstMatch)
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_batch_results_recorded_individually() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();
        backend.start().unwrap();

        handle.deliver_batch(vec![
            Advertisement::new("AA:BB:CC:DD:EE:01", -60),
            Advertisement::new("AA:BB:CC:DD:EE:02", -70),
        ]);

        let records = backend.hub().registry().snapshot::<ModernRecord>();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.callback_type == CallbackType::Batch));
    }

    #[tokio::test]
    async fn test_scan_failure_published_without_state_change() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();
        backend.start().unwrap();

        let mut events = backend.hub().subscribe();
        assert!(handle.fail_scan(2));

        assert_eq!(events.recv().await.unwrap(), ScanEvent::ScanFailed { error_code: 2 });
        assert!(backend.is_scanning());
    }

    #[test]
    fn test_revoked_permission_does_not_stop_running_scan() {
        let (backend, handle) = backend(23);
        handle.grant_location_permission();
        backend.start().unwrap();

        handle.revoke_location_permission();
        assert!(backend.is_scanning());

        backend.stop();
        assert_eq!(backend.start(), Err(ScanError::PermissionDenied));
    }

    #[test]
    fn test_late_results_accepted_when_configured() {
        let (platform, handle) = MockPlatform::new(PlatformRevision(23));
        let platform = Arc::new(platform);
        let config = ScannerConfig::default().with_accept_late_events(true);
        let backend = ModernBackend::new(platform.clone(), platform, &config);

        handle.grant_location_permission();
        backend.start().unwrap();
        backend.stop();

        assert!(handle.advertise_after_stop(Advertisement::new("AA:BB:CC:DD:EE:01", -60)));
        assert_eq!(backend.hub().registry().len(), 1);
    }
}
