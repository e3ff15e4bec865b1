//! Error types for scan operations.
//!
//! Scanning can only fail at start time: the modern backend refuses to touch
//! the platform scan API while location is unavailable, and the platform
//! itself may reject the call. Stopping a scan never fails.

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur when starting a scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// The fine location permission has not been granted.
    #[error("Location permission not granted")]
    PermissionDenied,

    /// None of the location providers is enabled.
    #[error("Location service disabled: at least one location provider must be enabled")]
    LocationServiceDisabled,

    /// The platform has no usable Bluetooth adapter.
    #[error("Bluetooth adapter unavailable")]
    AdapterUnavailable,

    /// The platform rejected the scan request.
    #[error("Platform scan error: {message}")]
    Platform { message: String },
}

impl ScanError {
    /// Create a new platform error.
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Check if this is the location-unavailable condition.
    ///
    /// Callers branch on this to drive the permission request flow (for
    /// [`ScanError::PermissionDenied`]) or a location settings prompt (for
    /// [`ScanError::LocationServiceDisabled`]) and then retry the start.
    ///
    /// # Examples
    ///
    /// ```
    /// use blescan_scanner::ScanError;
    ///
    /// assert!(ScanError::PermissionDenied.is_location_unavailable());
    /// assert!(ScanError::LocationServiceDisabled.is_location_unavailable());
    /// assert!(!ScanError::AdapterUnavailable.is_location_unavailable());
    /// ```
    pub fn is_location_unavailable(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::LocationServiceDisabled)
    }
}
