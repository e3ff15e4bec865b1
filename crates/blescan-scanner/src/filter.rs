//! Scan filters and scan settings.
//!
//! Filters and settings are only honoured by the modern backend, which
//! passes them to the platform verbatim. [`ScanFilter::matches`] exists for
//! platform implementations that evaluate filters in-process.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::advertising;
use crate::types::{Advertisement, CallbackType};

/// Match predicate for scan results.
///
/// Every criterion that is set must match; a filter with no criteria
/// matches everything.
///
/// # Examples
///
/// ```
/// use blescan_scanner::{Advertisement, ScanFilter};
///
/// let filter = ScanFilter::new().with_device_name("Thermometer");
///
/// assert!(filter.matches(&Advertisement::new("AA:BB:CC:DD:EE:01", -60).with_name("Thermometer")));
/// assert!(!filter.matches(&Advertisement::new("AA:BB:CC:DD:EE:02", -60)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    /// Exact advertised device name.
    pub device_name: Option<String>,

    /// Hardware address, compared case-insensitively.
    pub device_address: Option<String>,

    /// Service UUID that must appear in the advertisement.
    pub service_uuid: Option<Uuid>,
}

impl ScanFilter {
    /// Create a filter matching every result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an exact device name.
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Require a hardware address.
    pub fn with_device_address(mut self, address: impl Into<String>) -> Self {
        self.device_address = Some(address.into());
        self
    }

    /// Require an advertised service.
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = Some(uuid);
        self
    }

    /// Check if an advertisement satisfies this filter.
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        if let Some(name) = &self.device_name {
            let advertised = advertisement.name.clone().or_else(|| {
                advertisement
                    .scan_record
                    .as_deref()
                    .and_then(advertising::local_name)
            });
            if advertised.as_deref() != Some(name.as_str()) {
                return false;
            }
        }

        if let Some(address) = &self.device_address
            && !address.eq_ignore_ascii_case(&advertisement.address)
        {
            return false;
        }

        if let Some(uuid) = &self.service_uuid {
            let advertised = advertisement
                .scan_record
                .as_deref()
                .map(advertising::service_uuids)
                .unwrap_or_default();
            if !advertised.contains(uuid) {
                return false;
            }
        }

        true
    }
}

/// Check an advertisement against a filter list.
///
/// An empty list matches everything; otherwise any one filter must match.
pub fn matches_any(filters: &[ScanFilter], advertisement: &Advertisement) -> bool {
    filters.is_empty() || filters.iter().any(|filter| filter.matches(advertisement))
}

/// Trade-off between scan latency and power consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Only receive results of scans started by other applications.
    Opportunistic,

    /// Lowest power draw, highest latency.
    #[default]
    LowPower,

    /// Balance between power and latency.
    Balanced,

    /// Highest duty cycle, lowest latency.
    LowLatency,
}

impl ScanMode {
    /// Get the platform's integer constant.
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Opportunistic => -1,
            Self::LowPower => 0,
            Self::Balanced => 1,
            Self::LowLatency => 2,
        }
    }
}

/// Scan behaviour passed through to the platform.
///
/// # Examples
///
/// ```
/// use blescan_scanner::{CallbackType, ScanMode, ScanSettings};
///
/// let settings = ScanSettings::new()
///     .with_scan_mode(ScanMode::LowLatency)
///     .with_callback_type(CallbackType::FirstMatch);
///
/// assert_eq!(settings.scan_mode, ScanMode::LowLatency);
/// assert_eq!(settings.report_delay_ms, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Scan duty cycle.
    pub scan_mode: ScanMode,

    /// Which results are reported.
    pub callback_type: CallbackType,

    /// Batch reporting delay; `0` reports every result immediately.
    pub report_delay_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::LowPower,
            callback_type: CallbackType::AllMatches,
            report_delay_ms: 0,
        }
    }
}

impl ScanSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn with_callback_type(mut self, callback_type: CallbackType) -> Self {
        self.callback_type = callback_type;
        self
    }

    pub fn with_report_delay_ms(mut self, report_delay_ms: u64) -> Self {
        self.report_delay_ms = report_delay_ms;
        self
    }

    /// Check if results are delivered in batches.
    pub fn is_batched(&self) -> bool {
        self.report_delay_ms > 0
    }
}
