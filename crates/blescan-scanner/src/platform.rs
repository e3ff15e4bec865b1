//! Platform trait definitions.
//!
//! These traits are the seam between the scanner and the host operating
//! system. The two scan API traits mirror the two incompatible system scan
//! engines; only backends call them. [`PlatformContext`] answers permission
//! and location provider queries, and [`PermissionRequestor`] is implemented
//! by the external shell that can show a system permission prompt.
//!
//! The scan engines deliver results on a thread the scanner does not
//! control, so every callback type is `Send + Sync` and may be invoked
//! concurrently with calls into the scanner.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::{ScanFilter, ScanSettings};
use crate::types::{Advertisement, CallbackType, PlatformRevision};

/// Location provider that may satisfy the location service requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationProvider {
    /// Satellite positioning.
    Gps,

    /// Cell and Wi-Fi based positioning.
    Network,

    /// Positions computed for other applications.
    Passive,
}

impl LocationProvider {
    /// Every provider checked by the location service requirement.
    pub const ALL: [LocationProvider; 3] = [Self::Gps, Self::Network, Self::Passive];
}

impl fmt::Display for LocationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gps => write!(f, "gps"),
            Self::Network => write!(f, "network"),
            Self::Passive => write!(f, "passive"),
        }
    }
}

/// Host system queries.
pub trait PlatformContext: Send + Sync {
    /// Revision of the running platform.
    fn revision(&self) -> PlatformRevision;

    /// Check if a permission is currently granted to this process.
    ///
    /// Grants may be revoked at any time, so this must reflect the live
    /// state on every call.
    fn check_self_permission(&self, permission: &str) -> bool;

    /// Check if a location provider is currently enabled.
    fn is_provider_enabled(&self, provider: LocationProvider) -> bool;
}

/// Sink for the legacy scan engine.
pub type LeScanCallback = Arc<dyn Fn(Advertisement) + Send + Sync>;

/// Filter-less scan engine of older platform revisions.
pub trait LegacyScanApi: Send + Sync {
    /// Start continuous scanning, delivering every advertisement to `callback`.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter is unavailable or the engine refuses
    /// to start.
    fn start_le_scan(&self, callback: LeScanCallback) -> Result<()>;

    /// Stop the scan started by [`start_le_scan`](LegacyScanApi::start_le_scan).
    fn stop_le_scan(&self);
}

/// Sink for the modern scan engine.
pub trait ScanCallback: Send + Sync {
    /// A single result arrived.
    fn on_scan_result(&self, callback_type: CallbackType, result: Advertisement);

    /// Results delayed by the report delay setting arrived together.
    fn on_batch_scan_results(&self, results: Vec<Advertisement>);

    /// The engine could not run the scan.
    fn on_scan_failed(&self, error_code: i32);
}

/// Filterable scan engine of newer platform revisions.
pub trait ModernScanApi: Send + Sync {
    /// Start an unfiltered scan with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter is unavailable or the engine refuses
    /// to start.
    fn start_scan(&self, callback: Arc<dyn ScanCallback>) -> Result<()>;

    /// Start a scan restricted to `filters` and tuned by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter is unavailable or the engine refuses
    /// to start.
    fn start_scan_filtered(
        &self,
        filters: &[ScanFilter],
        settings: &ScanSettings,
        callback: Arc<dyn ScanCallback>,
    ) -> Result<()>;

    /// Stop the running scan.
    fn stop_scan(&self);
}

/// Component able to show the system permission prompt.
///
/// The result is delivered out-of-band: the implementor must route the
/// `(request_code, permissions, grant_results)` triple back into
/// [`BleScanner::handle_request_permission_result`](crate::BleScanner::handle_request_permission_result).
pub trait PermissionRequestor {
    fn request_permissions(&self, permissions: &[&str], request_code: i32);
}
