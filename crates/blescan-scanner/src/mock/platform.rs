//! Mock platform implementation for testing and development.
//!
//! This module provides a simulated host system implementing every platform
//! trait, controlled programmatically through a [`MockPlatformHandle`].

use std::sync::{Arc, Mutex};

use crate::error::{Result, ScanError};
use crate::filter::{ScanFilter, ScanSettings, matches_any};
use crate::lock_unpoisoned;
use crate::platform::{
    LeScanCallback, LegacyScanApi, LocationProvider, ModernScanApi, PermissionRequestor,
    PlatformContext, ScanCallback,
};
use crate::types::{Advertisement, CallbackType, FINE_LOCATION, PlatformRevision};

/// Mock host system for testing and development.
///
/// The mock delivers injected advertisements synchronously on the thread
/// calling the handle, the way a platform scan thread would. Legacy scans
/// receive everything; modern scans only receive advertisements matching
/// the filters they were started with.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use blescan_scanner::mock::MockPlatform;
/// use blescan_scanner::{Advertisement, BleScanner, LegacyRecord, PlatformRevision, ScannerConfig};
///
/// let (platform, handle) = MockPlatform::new(PlatformRevision(19));
/// handle.grant_location_permission();
///
/// let platform = Arc::new(platform);
/// let scanner = BleScanner::legacy(platform.clone(), platform, ScannerConfig::default());
/// scanner.start_scan().unwrap();
///
/// handle.advertise(Advertisement::new("AA:BB:CC:DD:EE:01", -60));
/// assert_eq!(scanner.all_found_devices::<LegacyRecord>().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    /// Create a mock platform of the given revision.
    ///
    /// The permission starts out not granted, every location provider is
    /// enabled and the adapter is available.
    pub fn new(revision: PlatformRevision) -> (Self, MockPlatformHandle) {
        let state = Arc::new(Mutex::new(MockState::new(revision)));

        let platform = Self {
            state: state.clone(),
        };
        let handle = MockPlatformHandle { state };

        (platform, handle)
    }

    fn check_start(state: &mut MockState) -> Result<()> {
        state.start_calls += 1;

        if !state.adapter_available {
            return Err(ScanError::AdapterUnavailable);
        }
        if let Some(message) = state.start_failure.take() {
            return Err(ScanError::platform(message));
        }
        Ok(())
    }
}

impl PlatformContext for MockPlatform {
    fn revision(&self) -> PlatformRevision {
        lock_unpoisoned(&self.state).revision
    }

    fn check_self_permission(&self, permission: &str) -> bool {
        permission == FINE_LOCATION && lock_unpoisoned(&self.state).permission_granted
    }

    fn is_provider_enabled(&self, provider: LocationProvider) -> bool {
        lock_unpoisoned(&self.state).providers.contains(&provider)
    }
}

impl LegacyScanApi for MockPlatform {
    fn start_le_scan(&self, callback: LeScanCallback) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        Self::check_start(&mut state)?;
        state.legacy_scan = Some(callback);
        Ok(())
    }

    fn stop_le_scan(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.stop_calls += 1;
        if let Some(callback) = state.legacy_scan.take() {
            state.stopped_legacy = Some(callback);
        }
    }
}

impl ModernScanApi for MockPlatform {
    fn start_scan(&self, callback: Arc<dyn ScanCallback>) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        Self::check_start(&mut state)?;
        state.modern_scan = Some(ModernScan {
            callback,
            filters: None,
            settings: None,
        });
        Ok(())
    }

    fn start_scan_filtered(
        &self,
        filters: &[ScanFilter],
        settings: &ScanSettings,
        callback: Arc<dyn ScanCallback>,
    ) -> Result<()> {
        let mut state = lock_unpoisoned(&self.state);
        Self::check_start(&mut state)?;
        state.modern_scan = Some(ModernScan {
            callback,
            filters: Some(filters.to_vec()),
            settings: Some(settings.clone()),
        });
        Ok(())
    }

    fn stop_scan(&self) {
        let mut state = lock_unpoisoned(&self.state);
        state.stop_calls += 1;
        if let Some(scan) = state.modern_scan.take() {
            state.stopped_modern = Some(scan.callback);
        }
    }
}

impl PermissionRequestor for MockPlatform {
    fn request_permissions(&self, permissions: &[&str], request_code: i32) {
        lock_unpoisoned(&self.state).permission_requests.push((
            permissions.iter().map(|p| p.to_string()).collect(),
            request_code,
        ));
    }
}

#[derive(Clone)]
struct ModernScan {
    callback: Arc<dyn ScanCallback>,
    filters: Option<Vec<ScanFilter>>,
    settings: Option<ScanSettings>,
}

struct MockState {
    revision: PlatformRevision,
    permission_granted: bool,
    providers: Vec<LocationProvider>,
    adapter_available: bool,
    start_failure: Option<String>,
    legacy_scan: Option<LeScanCallback>,
    modern_scan: Option<ModernScan>,
    stopped_legacy: Option<LeScanCallback>,
    stopped_modern: Option<Arc<dyn ScanCallback>>,
    permission_requests: Vec<(Vec<String>, i32)>,
    start_calls: usize,
    stop_calls: usize,
}

impl MockState {
    fn new(revision: PlatformRevision) -> Self {
        Self {
            revision,
            permission_granted: false,
            providers: LocationProvider::ALL.to_vec(),
            adapter_available: true,
            start_failure: None,
            legacy_scan: None,
            modern_scan: None,
            stopped_legacy: None,
            stopped_modern: None,
            permission_requests: Vec::new(),
            start_calls: 0,
            stop_calls: 0,
        }
    }
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("revision", &self.revision)
            .field("permission_granted", &self.permission_granted)
            .field("providers", &self.providers)
            .field("adapter_available", &self.adapter_available)
            .field("legacy_scanning", &self.legacy_scan.is_some())
            .field("modern_scanning", &self.modern_scan.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle for controlling a mock platform.
///
/// Changes made through the handle are visible to the platform immediately.
/// The handle can be cloned and moved to other threads.
#[derive(Debug, Clone)]
pub struct MockPlatformHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatformHandle {
    pub fn grant_location_permission(&self) {
        lock_unpoisoned(&self.state).permission_granted = true;
    }

    pub fn revoke_location_permission(&self) {
        lock_unpoisoned(&self.state).permission_granted = false;
    }

    pub fn set_provider_enabled(&self, provider: LocationProvider, enabled: bool) {
        let mut state = lock_unpoisoned(&self.state);
        state.providers.retain(|p| *p != provider);
        if enabled {
            state.providers.push(provider);
        }
    }

    pub fn disable_all_providers(&self) {
        lock_unpoisoned(&self.state).providers.clear();
    }

    /// Make the adapter disappear or come back.
    pub fn set_adapter_available(&self, available: bool) {
        lock_unpoisoned(&self.state).adapter_available = available;
    }

    /// Make the next start call fail with a platform error.
    pub fn fail_next_start(&self, message: impl Into<String>) {
        lock_unpoisoned(&self.state).start_failure = Some(message.into());
    }

    /// Deliver an advertisement to the running scan.
    ///
    /// Modern scans receive it as an [`CallbackType::AllMatches`] result.
    /// Returns `true` if a scan received it.
    pub fn advertise(&self, advertisement: Advertisement) -> bool {
        self.advertise_with_type(CallbackType::AllMatches, advertisement)
    }

    /// Deliver an advertisement with an explicit callback type.
    ///
    /// Legacy scans ignore the callback type. Returns `true` if a scan
    /// received it.
    pub fn advertise_with_type(
        &self,
        callback_type: CallbackType,
        advertisement: Advertisement,
    ) -> bool {
        let (legacy, modern) = {
            let state = lock_unpoisoned(&self.state);
            (state.legacy_scan.clone(), state.modern_scan.clone())
        };

        if let Some(callback) = legacy {
            callback(advertisement);
            return true;
        }

        match modern {
            Some(scan) if Self::passes(&scan, &advertisement) => {
                scan.callback.on_scan_result(callback_type, advertisement);
                true
            }
            _ => false,
        }
    }

    /// Deliver a batch report to the running modern scan.
    ///
    /// Advertisements not matching the scan filters are removed from the
    /// batch. Returns the number of results delivered.
    pub fn deliver_batch(&self, advertisements: Vec<Advertisement>) -> usize {
        let modern = lock_unpoisoned(&self.state).modern_scan.clone();

        let Some(scan) = modern else {
            return 0;
        };

        let batch: Vec<_> = advertisements
            .into_iter()
            .filter(|adv| Self::passes(&scan, adv))
            .collect();
        let count = batch.len();
        scan.callback.on_batch_scan_results(batch);
        count
    }

    /// Deliver an advertisement to the most recently stopped scan.
    ///
    /// Simulates an in-flight result racing the stop call. Returns `true`
    /// if a stopped scan existed.
    pub fn advertise_after_stop(&self, advertisement: Advertisement) -> bool {
        let (legacy, modern) = {
            let state = lock_unpoisoned(&self.state);
            (state.stopped_legacy.clone(), state.stopped_modern.clone())
        };

        if let Some(callback) = legacy {
            callback(advertisement);
            true
        } else if let Some(callback) = modern {
            callback.on_scan_result(CallbackType::AllMatches, advertisement);
            true
        } else {
            false
        }
    }

    /// Report a scan failure to the running modern scan.
    pub fn fail_scan(&self, error_code: i32) -> bool {
        let modern = lock_unpoisoned(&self.state).modern_scan.clone();

        match modern {
            Some(scan) => {
                scan.callback.on_scan_failed(error_code);
                true
            }
            None => false,
        }
    }

    /// Check if any platform scan is running.
    pub fn is_scanning(&self) -> bool {
        let state = lock_unpoisoned(&self.state);
        state.legacy_scan.is_some() || state.modern_scan.is_some()
    }

    /// Filters of the running modern scan, `None` if it was started unfiltered.
    pub fn active_filters(&self) -> Option<Vec<ScanFilter>> {
        lock_unpoisoned(&self.state)
            .modern_scan
            .as_ref()
            .and_then(|scan| scan.filters.clone())
    }

    /// Settings of the running modern scan, `None` if it was started unfiltered.
    pub fn active_settings(&self) -> Option<ScanSettings> {
        lock_unpoisoned(&self.state)
            .modern_scan
            .as_ref()
            .and_then(|scan| scan.settings.clone())
    }

    /// Number of start calls that reached the platform.
    pub fn start_calls(&self) -> usize {
        lock_unpoisoned(&self.state).start_calls
    }

    /// Number of stop calls that reached the platform.
    pub fn stop_calls(&self) -> usize {
        lock_unpoisoned(&self.state).stop_calls
    }

    /// Every permission prompt shown so far, as `(permissions, request_code)`.
    pub fn permission_requests(&self) -> Vec<(Vec<String>, i32)> {
        lock_unpoisoned(&self.state).permission_requests.clone()
    }

    fn passes(scan: &ModernScan, advertisement: &Advertisement) -> bool {
        scan.filters
            .as_deref()
            .is_none_or(|filters| matches_any(filters, advertisement))
    }
}
