//! Scanner facade.
//!
//! [`BleScanner`] owns one backend for its whole life, the device registry
//! behind it, and the outstanding permission request. Scan calls are pure
//! delegation: backend errors reach the caller unchanged.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use blescan_scanner::mock::MockPlatform;
//! use blescan_scanner::{
//!     Advertisement, BleScanner, GrantResult, ModernRecord, PlatformRevision, ScannerConfig,
//!     FINE_LOCATION,
//! };
//!
//! let (platform, handle) = MockPlatform::new(PlatformRevision(26));
//! let platform = Arc::new(platform);
//! let scanner = BleScanner::modern(platform.clone(), platform.clone(), ScannerConfig::default());
//!
//! // Without permission the scan does not start
//! let error = scanner.start_scan().unwrap_err();
//! assert!(error.is_location_unavailable());
//!
//! // Ask for it, then route the shell's answer back
//! scanner.request_location_permission(&*platform, scanner.permission_request_code(), |granted| {
//!     assert!(granted);
//! });
//! handle.grant_location_permission();
//! assert!(scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Granted]));
//!
//! scanner.start_scan().unwrap();
//! handle.advertise(Advertisement::new("AA:BB:CC:DD:EE:01", -60));
//! assert_eq!(scanner.all_found_devices::<ModernRecord>().len(), 1);
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use crate::backends::{LegacyBackend, ModernBackend, ScanBackend, ScanStrategy};
use crate::config::ScannerConfig;
use crate::discovery::ScanEvent;
use crate::error::Result;
use crate::filter::{ScanFilter, ScanSettings};
use crate::lock_unpoisoned;
use crate::permission::PendingPermission;
use crate::platform::{LegacyScanApi, ModernScanApi, PermissionRequestor, PlatformContext};
use crate::types::{
    BackendKind, DeviceRecord, FINE_LOCATION, FoundDevice, GrantResult, LegacyRecord,
    ModernRecord, PermissionState, ScanState,
};

/// Uniform scanner over either backend.
///
/// Dropping the scanner stops a running scan.
#[derive(Debug)]
pub struct BleScanner {
    backend: ScanBackend,
    config: ScannerConfig,
    pending_permission: Mutex<Option<PendingPermission>>,
}

impl BleScanner {
    /// Create a scanner owning `backend`.
    ///
    /// `config` should be the configuration the backend was built with;
    /// the scanner reads the permission request code from it.
    pub fn new(backend: impl Into<ScanBackend>, config: ScannerConfig) -> Self {
        let backend = backend.into();
        debug!(backend = %backend.kind(), "Creating scanner");

        Self {
            backend,
            config,
            pending_permission: Mutex::new(None),
        }
    }

    /// Create a scanner on the legacy backend.
    pub fn legacy(
        context: Arc<dyn PlatformContext>,
        api: Arc<dyn LegacyScanApi>,
        config: ScannerConfig,
    ) -> Self {
        let backend = LegacyBackend::new(context, api, &config);
        Self::new(backend, config)
    }

    /// Create a scanner on the modern backend.
    pub fn modern(
        context: Arc<dyn PlatformContext>,
        api: Arc<dyn ModernScanApi>,
        config: ScannerConfig,
    ) -> Self {
        let backend = ModernBackend::new(context, api, &config);
        Self::new(backend, config)
    }

    pub fn backend(&self) -> &ScanBackend {
        &self.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Request code this scanner claims permission results for.
    pub fn permission_request_code(&self) -> i32 {
        self.config.permission_request_code
    }

    /// Start scanning without filters.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged; see
    /// [`ScanError::is_location_unavailable`](crate::ScanError::is_location_unavailable).
    pub fn start_scan(&self) -> Result<()> {
        self.backend.start()
    }

    /// Start scanning with filters and settings.
    ///
    /// The legacy backend ignores both and behaves as [`start_scan`](Self::start_scan).
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub fn start_scan_with(&self, filters: &[ScanFilter], settings: &ScanSettings) -> Result<()> {
        self.backend.start_with(filters, settings)
    }

    /// Stop scanning. Safe to call at any time, any number of times.
    pub fn stop_scan(&self) {
        self.backend.stop();
    }

    pub fn is_scanning(&self) -> bool {
        self.backend.is_scanning()
    }

    pub fn scan_state(&self) -> ScanState {
        self.backend.state()
    }

    /// Current location permission and service state.
    pub fn permission_state(&self) -> PermissionState {
        self.backend.permission_gate().permission_state()
    }

    /// Snapshot of every discovered device.
    ///
    /// `T` must match the backend: [`LegacyRecord`] for the legacy backend,
    /// [`ModernRecord`] for the modern one, or [`DeviceRecord`] for either.
    /// Asking for the other backend's record kind yields an empty list.
    pub fn all_found_devices<T: FoundDevice>(&self) -> Vec<T> {
        self.backend.hub().registry().snapshot()
    }

    /// Most recent record for a hardware address.
    pub fn found_device(&self, address: &str) -> Option<DeviceRecord> {
        self.backend.hub().registry().get(address)
    }

    pub fn found_device_count(&self) -> usize {
        self.backend.hub().registry().len()
    }

    /// Forget every discovered device.
    pub fn clear_found_devices(&self) {
        self.backend.hub().registry().clear();
    }

    /// Set the callback receiving every discovery of either backend.
    ///
    /// It runs before the backend-specific callback for the same event.
    pub fn set_on_device_found_default<F>(&self, callback: F)
    where
        F: Fn(&str, i32, Option<&[u8]>) + Send + Sync + 'static,
    {
        self.backend.hub().set_default_callback(Arc::new(callback));
    }

    /// Set the callback receiving legacy backend records.
    pub fn set_on_device_found_legacy<F>(&self, callback: F)
    where
        F: Fn(&LegacyRecord) + Send + Sync + 'static,
    {
        self.backend.hub().set_legacy_callback(Arc::new(callback));
    }

    /// Set the callback receiving modern backend records.
    pub fn set_on_device_found_modern<F>(&self, callback: F)
    where
        F: Fn(&ModernRecord) + Send + Sync + 'static,
    {
        self.backend.hub().set_modern_callback(Arc::new(callback));
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.backend.hub().subscribe()
    }

    /// Ask the shell to prompt for the location permission.
    ///
    /// `on_granted` runs once, when the matching result is routed into
    /// [`handle_request_permission_result`](Self::handle_request_permission_result).
    /// A new request replaces an outstanding one, whose callback is then
    /// never invoked.
    pub fn request_location_permission<F>(
        &self,
        requestor: &dyn PermissionRequestor,
        request_code: i32,
        on_granted: F,
    ) where
        F: FnOnce(bool) + Send + 'static,
    {
        let pending = PendingPermission::new(request_code, on_granted);

        // Stored before prompting: a shell may answer synchronously
        if lock_unpoisoned(&self.pending_permission)
            .replace(pending)
            .is_some()
        {
            debug!("Superseding outstanding permission request");
        }

        self.backend
            .permission_gate()
            .prompt(requestor, request_code);
    }

    /// Ask for the location permission and wait for the answer.
    ///
    /// Resolves to `false` if the request is superseded or the scanner is
    /// dropped before a result arrives.
    pub fn request_location_permission_async(
        &self,
        requestor: &dyn PermissionRequestor,
    ) -> impl Future<Output = bool> + Send + use<> {
        let (tx, rx) = oneshot::channel();

        self.request_location_permission(requestor, self.permission_request_code(), move |granted| {
            let _ = tx.send(granted);
        });

        async move { rx.await.unwrap_or(false) }
    }

    /// Route a permission result from the shell.
    ///
    /// Returns `true` if the result belongs to this scanner: the request code
    /// is the configured one and `permissions` contains fine location. The
    /// return value says nothing about whether the permission was granted;
    /// that is passed to the stored callback.
    pub fn handle_request_permission_result<P: AsRef<str>>(
        &self,
        request_code: i32,
        permissions: &[P],
        grant_results: &[GrantResult],
    ) -> bool {
        let handled = request_code == self.config.permission_request_code
            && permissions.iter().any(|p| p.as_ref() == FINE_LOCATION);

        if !handled {
            return false;
        }

        let granted = !grant_results.is_empty()
            && permissions.first().is_some_and(|p| p.as_ref() == FINE_LOCATION)
            && grant_results[0] == GrantResult::Granted;

        debug!(request_code, granted, "Location permission result");

        let pending = lock_unpoisoned(&self.pending_permission).take();
        match pending {
            Some(pending) => pending.complete(granted),
            None => debug!("No outstanding permission request"),
        }

        true
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        self.backend.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::mock::{MockPlatform, MockPlatformHandle};
    use crate::types::{Advertisement, PlatformRevision};
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn modern_scanner() -> (BleScanner, Arc<MockPlatform>, MockPlatformHandle) {
        let (platform, handle) = MockPlatform::new(PlatformRevision(23));
        let platform = Arc::new(platform);
        let scanner =
            BleScanner::modern(platform.clone(), platform.clone(), ScannerConfig::default());
        (scanner, platform, handle)
    }

    fn legacy_scanner() -> (BleScanner, MockPlatformHandle) {
        let (platform, handle) = MockPlatform::new(PlatformRevision(18));
        let platform = Arc::new(platform);
        let scanner = BleScanner::legacy(platform.clone(), platform, ScannerConfig::default());
        (scanner, handle)
    }

    #[test]
    fn test_backend_kind_fixed_at_construction() {
        let (scanner, _, _) = modern_scanner();
        assert_eq!(scanner.backend_kind(), BackendKind::Modern);

        let (scanner, _) = legacy_scanner();
        assert_eq!(scanner.backend_kind(), BackendKind::Legacy);
    }

    #[test]
    fn test_errors_propagate_unchanged() {
        let (scanner, _, handle) = modern_scanner();
        assert_eq!(scanner.start_scan(), Err(ScanError::PermissionDenied));

        handle.grant_location_permission();
        handle.disable_all_providers();
        assert_eq!(scanner.start_scan(), Err(ScanError::LocationServiceDisabled));

        handle.set_provider_enabled(crate::platform::LocationProvider::Gps, true);
        handle.fail_next_start("registration failed");
        assert_eq!(
            scanner.start_scan(),
            Err(ScanError::platform("registration failed"))
        );
        assert!(!scanner.is_scanning());
    }

    #[test]
    fn test_wrong_record_kind_yields_nothing() {
        let (scanner, handle) = legacy_scanner();
        handle.grant_location_permission();
        scanner.start_scan().unwrap();
        handle.advertise(Advertisement::new("AA:BB:CC:DD:EE:01", -60));

        assert_eq!(scanner.all_found_devices::<LegacyRecord>().len(), 1);
        assert_eq!(scanner.all_found_devices::<DeviceRecord>().len(), 1);
        assert!(scanner.all_found_devices::<ModernRecord>().is_empty());
    }

    #[test]
    fn test_clear_found_devices() {
        let (scanner, handle) = legacy_scanner();
        handle.grant_location_permission();
        scanner.start_scan().unwrap();
        handle.advertise(Advertisement::new("AA:BB:CC:DD:EE:01", -60));
        assert_eq!(scanner.found_device_count(), 1);

        scanner.clear_found_devices();
        assert_eq!(scanner.found_device_count(), 0);
        assert!(scanner.found_device("AA:BB:CC:DD:EE:01").is_none());
    }

    #[rstest]
    #[case::wrong_code(2, vec![FINE_LOCATION], vec![GrantResult::Granted], false)]
    #[case::wrong_permission(1, vec!["android.permission.CAMERA"], vec![GrantResult::Granted], false)]
    #[case::no_permissions(1, vec![], vec![], false)]
    #[case::granted(1, vec![FINE_LOCATION], vec![GrantResult::Granted], true)]
    #[case::denied(1, vec![FINE_LOCATION], vec![GrantResult::Denied], true)]
    #[case::empty_results(1, vec![FINE_LOCATION], vec![], true)]
    #[case::fine_not_first(
        1,
        vec!["android.permission.CAMERA", FINE_LOCATION],
        vec![GrantResult::Granted, GrantResult::Granted],
        true
    )]
    fn test_permission_result_ownership(
        #[case] request_code: i32,
        #[case] permissions: Vec<&str>,
        #[case] grant_results: Vec<GrantResult>,
        #[case] expected: bool,
    ) {
        let (scanner, _, _) = modern_scanner();
        assert_eq!(
            scanner.handle_request_permission_result(request_code, permissions.as_slice(), &grant_results),
            expected
        );
    }

    #[rstest]
    #[case::granted(vec![FINE_LOCATION], vec![GrantResult::Granted], true)]
    #[case::denied(vec![FINE_LOCATION], vec![GrantResult::Denied], false)]
    #[case::empty_results(vec![FINE_LOCATION], vec![], false)]
    #[case::fine_not_first(
        vec!["android.permission.CAMERA", FINE_LOCATION],
        vec![GrantResult::Granted, GrantResult::Granted],
        false
    )]
    fn test_permission_result_granted_value(
        #[case] permissions: Vec<&str>,
        #[case] grant_results: Vec<GrantResult>,
        #[case] expected: bool,
    ) {
        let (scanner, platform, _) = modern_scanner();
        let result = Arc::new(Mutex::new(None));

        let slot = result.clone();
        scanner.request_location_permission(&*platform, 1, move |granted| {
            *slot.lock().unwrap() = Some(granted);
        });

        assert!(scanner.handle_request_permission_result(1, permissions.as_slice(), &grant_results));
        assert_eq!(*result.lock().unwrap(), Some(expected));
    }

    #[test]
    fn test_permission_callback_invoked_exactly_once() {
        let (scanner, platform, handle) = modern_scanner();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        scanner.request_location_permission(&*platform, 1, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.permission_requests().len(), 1);

        assert!(scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Granted]));
        assert!(scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Granted]));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unclaimed_result_keeps_pending_request() {
        let (scanner, platform, _) = modern_scanner();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        scanner.request_location_permission(&*platform, 1, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!scanner.handle_request_permission_result(5, &[FINE_LOCATION], &[GrantResult::Granted]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Denied]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_configured_request_code() {
        let (platform, handle) = MockPlatform::new(PlatformRevision(23));
        let platform = Arc::new(platform);
        let config = ScannerConfig::default().with_permission_request_code(42);
        let scanner = BleScanner::modern(platform.clone(), platform.clone(), config);

        scanner.request_location_permission(&*platform, scanner.permission_request_code(), |_| {});
        assert_eq!(handle.permission_requests()[0].1, 42);

        assert!(!scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Granted]));
        assert!(scanner.handle_request_permission_result(42, &[FINE_LOCATION], &[GrantResult::Granted]));
    }

    #[tokio::test]
    async fn test_async_permission_request() {
        let (scanner, platform, _) = modern_scanner();

        let answer = scanner.request_location_permission_async(&*platform);
        assert!(scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Granted]));

        assert!(answer.await);
    }

    #[tokio::test]
    async fn test_superseded_async_request_resolves_false() {
        let (scanner, platform, _) = modern_scanner();

        let first = scanner.request_location_permission_async(&*platform);
        let second = scanner.request_location_permission_async(&*platform);
        assert!(scanner.handle_request_permission_result(1, &[FINE_LOCATION], &[GrantResult::Granted]));

        assert!(!first.await);
        assert!(second.await);
    }

    #[test]
    fn test_drop_stops_scan() {
        let (scanner, _, handle) = modern_scanner();
        handle.grant_location_permission();
        scanner.start_scan().unwrap();
        assert!(handle.is_scanning());

        drop(scanner);
        assert!(!handle.is_scanning());
        assert_eq!(handle.stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let (scanner, _, handle) = modern_scanner();
        let mut events = scanner.subscribe();
        handle.grant_location_permission();

        scanner.start_scan().unwrap();
        scanner.start_scan().unwrap();
        scanner.stop_scan();
        scanner.stop_scan();

        assert_eq!(events.recv().await.unwrap(), ScanEvent::ScanStarted(BackendKind::Modern));
        assert_eq!(events.recv().await.unwrap(), ScanEvent::ScanStopped(BackendKind::Modern));
        assert!(events.try_recv().is_err());
    }
}
