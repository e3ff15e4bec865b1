//! Common test utilities for scanner integration tests.
//!
//! Each helper builds a scanner over a fresh [`MockPlatform`] and returns
//! the control handle alongside it, so tests can drive the simulated host.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use blescan_scanner::mock::{MockPlatform, MockPlatformHandle};
use blescan_scanner::{Advertisement, BleScanner, PlatformRevision, ScannerConfig};

pub const DEVICE_A: &str = "AA:BB:CC:DD:EE:01";
pub const DEVICE_B: &str = "AA:BB:CC:DD:EE:02";
pub const DEVICE_C: &str = "AA:BB:CC:DD:EE:03";

/// Scanner plus the pieces a test needs to drive it.
pub struct Harness {
    pub scanner: BleScanner,
    pub platform: Arc<MockPlatform>,
    pub handle: MockPlatformHandle,
}

pub fn legacy_harness() -> Harness {
    harness(PlatformRevision::JELLY_BEAN_MR2, ScannerConfig::default())
}

pub fn modern_harness() -> Harness {
    harness(PlatformRevision::MARSHMALLOW, ScannerConfig::default())
}

/// Build a scanner whose backend follows `revision`.
pub fn harness(revision: PlatformRevision, config: ScannerConfig) -> Harness {
    let (platform, handle) = MockPlatform::new(revision);
    let platform = Arc::new(platform);

    let scanner = match blescan_scanner::BackendKind::for_revision(revision) {
        blescan_scanner::BackendKind::Legacy => {
            BleScanner::legacy(platform.clone(), platform.clone(), config)
        }
        blescan_scanner::BackendKind::Modern => {
            BleScanner::modern(platform.clone(), platform.clone(), config)
        }
    };

    Harness {
        scanner,
        platform,
        handle,
    }
}

/// Same as [`harness`] with the permission already granted and a scan running.
pub fn scanning_harness(revision: PlatformRevision) -> Harness {
    let harness = harness(revision, ScannerConfig::default());
    harness.handle.grant_location_permission();
    harness
        .scanner
        .start_scan()
        .expect("scan should start with permission granted");
    harness
}

pub fn advertisement(address: &str, rssi: i32) -> Advertisement {
    Advertisement::new(address, rssi)
}

/// Shared log of labels, appended to by callbacks under test.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
