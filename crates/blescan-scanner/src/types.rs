//! Common types shared by the backends and the scanner facade.
//!
//! This module defines the discovered-device records, the raw observation
//! delivered by the platform, callback types, permission state, and the
//! platform revision used by callers to pick a backend.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Permission identity requested by the scanner.
pub const FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";

/// Request code used for location permission prompts unless configured
/// otherwise.
pub const DEFAULT_PERMISSION_REQUEST_CODE: i32 = 1;

/// Platform revision (API level) of the host system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformRevision(pub u32);

impl PlatformRevision {
    /// First revision with the filter-less low energy scan API.
    pub const JELLY_BEAN_MR2: Self = Self(18);

    /// First revision with the filterable scanner API.
    pub const LOLLIPOP: Self = Self(21);

    /// First revision where scan results require an enabled location service.
    pub const MARSHMALLOW: Self = Self(23);

    /// Check if this revision distinguishes an explicit location service.
    pub fn requires_location_service(&self) -> bool {
        *self >= Self::MARSHMALLOW
    }
}

impl fmt::Display for PlatformRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API {}", self.0)
    }
}

/// Which scanning strategy a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Filter-less callback scanning for revisions 18-20.
    Legacy,

    /// Filterable scanning for revision 21 and above.
    Modern,
}

impl BackendKind {
    /// Pick the backend suited to a platform revision.
    ///
    /// # Examples
    ///
    /// ```
    /// use blescan_scanner::{BackendKind, PlatformRevision};
    ///
    /// assert_eq!(BackendKind::for_revision(PlatformRevision(19)), BackendKind::Legacy);
    /// assert_eq!(BackendKind::for_revision(PlatformRevision(21)), BackendKind::Modern);
    /// ```
    pub fn for_revision(revision: PlatformRevision) -> Self {
        if revision >= PlatformRevision::LOLLIPOP {
            Self::Modern
        } else {
            Self::Legacy
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "Legacy"),
            Self::Modern => write!(f, "Modern"),
        }
    }
}

/// How a modern scan result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CallbackType {
    /// Every advertisement matching the filters.
    AllMatches,

    /// First advertisement of a device matching the filters.
    FirstMatch,

    /// A previously matched device is no longer seen.
    MatchLost,

    /// Result delivered as part of a batch report.
    Batch,

    /// Tag not known to this crate.
    Other(i32),
}

impl CallbackType {
    /// Convert from the platform's integer tag.
    ///
    /// Batch results carry no tag on the platform, so `Batch` is never
    /// produced here.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::AllMatches,
            2 => Self::FirstMatch,
            4 => Self::MatchLost,
            other => Self::Other(other),
        }
    }

    /// Get the platform's integer tag.
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::AllMatches => 1,
            Self::FirstMatch => 2,
            Self::MatchLost => 4,
            Self::Batch => 0,
            Self::Other(raw) => *raw,
        }
    }
}

/// One advertisement as observed by the platform scan engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Hardware address of the advertiser.
    pub address: String,

    /// Device name known to the platform, if any.
    pub name: Option<String>,

    /// Received signal strength in dBm.
    pub rssi: i32,

    /// Raw advertisement payload.
    pub scan_record: Option<Vec<u8>>,
}

impl Advertisement {
    /// Create an advertisement without name or payload.
    pub fn new(address: impl Into<String>, rssi: i32) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi,
            scan_record: None,
        }
    }

    /// Set the device name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the raw advertisement payload.
    pub fn with_scan_record(mut self, scan_record: Vec<u8>) -> Self {
        self.scan_record = Some(scan_record);
        self
    }
}

/// Device discovered by the legacy backend.
///
/// Two records with the same hardware address are the same device, even if
/// signal strength or payload differ between discoveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyRecord {
    /// Hardware address, unique per physical device.
    pub hardware_address: String,

    /// Advertised or cached device name.
    pub display_name: Option<String>,

    /// Received signal strength in dBm.
    pub signal_strength: i32,

    /// Raw advertisement payload.
    pub raw_advertisement: Option<Vec<u8>>,

    /// When the advertisement was received.
    pub seen_at: DateTime<Utc>,
}

impl LegacyRecord {
    /// Build a record from a platform observation, stamped with the current time.
    pub fn from_advertisement(advertisement: Advertisement) -> Self {
        Self {
            hardware_address: advertisement.address,
            display_name: advertisement.name,
            signal_strength: advertisement.rssi,
            raw_advertisement: advertisement.scan_record,
            seen_at: Utc::now(),
        }
    }
}

impl PartialEq for LegacyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.hardware_address == other.hardware_address
    }
}

impl Eq for LegacyRecord {}

impl Hash for LegacyRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hardware_address.hash(state);
    }
}

/// Device discovered by the modern backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModernRecord {
    /// How this result was obtained.
    pub callback_type: CallbackType,

    /// Hardware address, unique per physical device.
    pub hardware_address: String,

    /// Advertised or cached device name.
    pub display_name: Option<String>,

    /// Received signal strength in dBm.
    pub signal_strength: i32,

    /// Raw advertisement payload.
    pub raw_advertisement: Option<Vec<u8>>,

    /// When the result was received.
    pub seen_at: DateTime<Utc>,
}

impl ModernRecord {
    /// Build a record from a platform observation, stamped with the current time.
    pub fn from_advertisement(callback_type: CallbackType, advertisement: Advertisement) -> Self {
        Self {
            callback_type,
            hardware_address: advertisement.address,
            display_name: advertisement.name,
            signal_strength: advertisement.rssi,
            raw_advertisement: advertisement.scan_record,
            seen_at: Utc::now(),
        }
    }
}

/// A discovered device of either backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DeviceRecord {
    /// Record produced by the legacy backend.
    Legacy(LegacyRecord),

    /// Record produced by the modern backend.
    Modern(ModernRecord),
}

impl DeviceRecord {
    pub fn hardware_address(&self) -> &str {
        match self {
            Self::Legacy(record) => &record.hardware_address,
            Self::Modern(record) => &record.hardware_address,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Legacy(record) => record.display_name.as_deref(),
            Self::Modern(record) => record.display_name.as_deref(),
        }
    }

    pub fn signal_strength(&self) -> i32 {
        match self {
            Self::Legacy(record) => record.signal_strength,
            Self::Modern(record) => record.signal_strength,
        }
    }

    pub fn raw_advertisement(&self) -> Option<&[u8]> {
        match self {
            Self::Legacy(record) => record.raw_advertisement.as_deref(),
            Self::Modern(record) => record.raw_advertisement.as_deref(),
        }
    }

    /// Which backend produced this record.
    pub fn backend_kind(&self) -> BackendKind {
        match self {
            Self::Legacy(_) => BackendKind::Legacy,
            Self::Modern(_) => BackendKind::Modern,
        }
    }
}

impl From<LegacyRecord> for DeviceRecord {
    fn from(record: LegacyRecord) -> Self {
        Self::Legacy(record)
    }
}

impl From<ModernRecord> for DeviceRecord {
    fn from(record: ModernRecord) -> Self {
        Self::Modern(record)
    }
}

/// Record types that can be read back from the registry.
///
/// Implemented for both concrete record kinds and for [`DeviceRecord`]
/// itself. Asking for the kind the active backend does not produce yields
/// nothing.
pub trait FoundDevice: Sized {
    /// Extract this record kind from a registry entry.
    fn from_record(record: &DeviceRecord) -> Option<Self>;
}

impl FoundDevice for DeviceRecord {
    fn from_record(record: &DeviceRecord) -> Option<Self> {
        Some(record.clone())
    }
}

impl FoundDevice for LegacyRecord {
    fn from_record(record: &DeviceRecord) -> Option<Self> {
        match record {
            DeviceRecord::Legacy(record) => Some(record.clone()),
            DeviceRecord::Modern(_) => None,
        }
    }
}

impl FoundDevice for ModernRecord {
    fn from_record(record: &DeviceRecord) -> Option<Self> {
        match record {
            DeviceRecord::Modern(record) => Some(record.clone()),
            DeviceRecord::Legacy(_) => None,
        }
    }
}

/// Location permission and service state, computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionState {
    /// Fine location permission is granted.
    pub granted: bool,

    /// At least one location provider is enabled (or the platform has no
    /// such concept).
    pub location_service_enabled: bool,
}

impl PermissionState {
    /// Check if scanning may proceed on a location-gated backend.
    pub fn is_satisfied(&self) -> bool {
        self.granted && self.location_service_enabled
    }
}

/// Scan session state of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// No platform scan is running.
    #[default]
    Idle,

    /// A platform scan was started and not yet stopped.
    Scanning,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
        }
    }
}

/// Outcome of a single permission in a permission result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantResult {
    /// The user granted the permission.
    Granted,

    /// The user denied the permission or dismissed the prompt.
    Denied,
}

impl GrantResult {
    /// Convert from the platform's integer status (`0` granted, `-1` denied).
    pub fn from_raw(raw: i32) -> Self {
        if raw == 0 { Self::Granted } else { Self::Denied }
    }
}
