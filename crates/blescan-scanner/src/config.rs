//! Scanner configuration.

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_PERMISSION_REQUEST_CODE;

/// Default number of events buffered per stream subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Configuration for a [`BleScanner`](crate::BleScanner) and its backend.
///
/// Missing fields take their default when deserializing.
///
/// # Examples
///
/// ```
/// use blescan_scanner::ScannerConfig;
///
/// let config = ScannerConfig::default()
///     .with_permission_request_code(42)
///     .with_debug(false);
///
/// assert_eq!(config.permission_request_code, 42);
/// assert!(!config.accept_late_events);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Request code identifying this scanner's permission prompts.
    pub permission_request_code: i32,

    /// Log scan start and stop at debug level.
    pub debug: bool,

    /// Events buffered per subscriber of the event stream.
    pub event_capacity: usize,

    /// Store and forward results that arrive after the scan was stopped.
    pub accept_late_events: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            permission_request_code: DEFAULT_PERMISSION_REQUEST_CODE,
            debug: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            accept_late_events: false,
        }
    }
}

impl ScannerConfig {
    pub fn with_permission_request_code(mut self, request_code: i32) -> Self {
        self.permission_request_code = request_code;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_accept_late_events(mut self, accept: bool) -> Self {
        self.accept_late_events = accept;
        self
    }
}
