//! Bluetooth Low Energy scanning facade.
//!
//! This crate hides the two generations of platform scan engines behind a
//! single [`BleScanner`]. The facade gates scanning on the location
//! permission and location service, collects discovered devices into a
//! de-duplicating registry, and fans every discovery out to user callbacks
//! and an event stream.
//!
//! # Backends
//!
//! The backend is picked once, from the platform revision:
//!
//! - **Legacy** (revisions 18-20): filter-less scanning, gated on the
//!   location permission only.
//! - **Modern** (revision 21 and above): filterable scanning with settings,
//!   gated on the permission and, from revision 23, on at least one enabled
//!   location provider.
//!
//! ```
//! use blescan_scanner::{BackendKind, PlatformRevision};
//!
//! assert_eq!(BackendKind::for_revision(PlatformRevision(19)), BackendKind::Legacy);
//! assert_eq!(BackendKind::for_revision(PlatformRevision(26)), BackendKind::Modern);
//! ```
//!
//! # Platform Seams
//!
//! The host system is reached only through the traits in [`platform`]. The
//! [`mock`] module implements all of them in-process for tests and the
//! command-line shell.
//!
//! # Error Handling
//!
//! Fallible operations return [`Result<T>`][error::Result] with the
//! [`ScanError`] type. A start refused for lack of location access is
//! recognised with [`ScanError::is_location_unavailable`]; the usual
//! recovery is to request the permission and retry.
//!
//! # Thread Safety
//!
//! Platform results arrive on arbitrary threads. [`BleScanner`] is
//! `Send + Sync` and the registry is locked internally. Callbacks run
//! outside of any lock, so they may call back into the scanner.

pub mod advertising;
pub mod backends;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod mock;
pub mod permission;
pub mod platform;
pub mod registry;
pub mod scanner;
pub mod types;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// Re-export commonly used types for convenience
pub use backends::{LegacyBackend, ModernBackend, ScanBackend, ScanStrategy};
pub use config::ScannerConfig;
pub use discovery::{DiscoveryHub, ScanEvent};
pub use error::{Result, ScanError};
pub use filter::{ScanFilter, ScanMode, ScanSettings};
pub use permission::{PendingPermission, PermissionGate};
pub use platform::{
    LeScanCallback, LegacyScanApi, LocationProvider, ModernScanApi, PermissionRequestor,
    PlatformContext, ScanCallback,
};
pub use registry::DeviceRegistry;
pub use scanner::BleScanner;
pub use types::{
    Advertisement, BackendKind, CallbackType, DEFAULT_PERMISSION_REQUEST_CODE, DeviceRecord,
    FINE_LOCATION, FoundDevice, GrantResult, LegacyRecord, ModernRecord, PermissionState,
    PlatformRevision, ScanState,
};

// Poisoned locks are recovered; no guarded value is left half-updated by a panic.

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read_unpoisoned<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_unpoisoned<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
