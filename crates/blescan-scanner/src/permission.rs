//! Location permission and location service gate.
//!
//! Scanning on newer platform revisions only yields results while the fine
//! location permission is granted and, from revision 23 on, at least one
//! location provider is enabled. The gate answers both questions from the
//! live platform state on every call and drives the permission prompt.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::platform::{LocationProvider, PermissionRequestor, PlatformContext};
use crate::types::{FINE_LOCATION, PermissionState};

/// Queries and requests location permission through the platform.
#[derive(Clone)]
pub struct PermissionGate {
    context: Arc<dyn PlatformContext>,
}

impl PermissionGate {
    pub fn new(context: Arc<dyn PlatformContext>) -> Self {
        Self { context }
    }

    /// Check if the fine location permission is currently granted.
    pub fn is_location_permission_granted(&self) -> bool {
        self.context.check_self_permission(FINE_LOCATION)
    }

    /// Check if the location service is available.
    ///
    /// Revisions predating the explicit location service always report
    /// `true`; otherwise any enabled provider among GPS, network and passive
    /// is enough.
    pub fn is_location_service_enabled(&self) -> bool {
        if !self.context.revision().requires_location_service() {
            return true;
        }

        LocationProvider::ALL
            .iter()
            .any(|provider| self.context.is_provider_enabled(*provider))
    }

    /// Compute the current permission state.
    pub fn permission_state(&self) -> PermissionState {
        PermissionState {
            granted: self.is_location_permission_granted(),
            location_service_enabled: self.is_location_service_enabled(),
        }
    }

    /// Show the permission prompt and return the handle completing the request.
    ///
    /// `on_result` runs when the returned handle is completed with the
    /// user's answer. Nothing blocks waiting for it.
    pub fn request_permission<F>(
        &self,
        requestor: &dyn PermissionRequestor,
        request_code: i32,
        on_result: F,
    ) -> PendingPermission
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let pending = PendingPermission::new(request_code, on_result);
        self.prompt(requestor, request_code);
        pending
    }

    /// Ask the requestor to show the fine location prompt.
    pub(crate) fn prompt(&self, requestor: &dyn PermissionRequestor, request_code: i32) {
        debug!(request_code, "Requesting location permission");
        requestor.request_permissions(&[FINE_LOCATION], request_code);
    }
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("revision", &self.context.revision())
            .finish()
    }
}

/// Outstanding permission request.
///
/// Holds the result callback until [`complete`](PendingPermission::complete)
/// consumes it, so the callback runs at most once. Dropping the handle
/// discards the callback without invoking it.
pub struct PendingPermission {
    request_code: i32,
    on_result: Box<dyn FnOnce(bool) + Send>,
}

impl PendingPermission {
    pub fn new<F>(request_code: i32, on_result: F) -> Self
    where
        F: FnOnce(bool) + Send + 'static,
    {
        Self {
            request_code,
            on_result: Box::new(on_result),
        }
    }

    pub fn request_code(&self) -> i32 {
        self.request_code
    }

    /// Deliver the user's answer.
    pub fn complete(self, granted: bool) {
        (self.on_result)(granted);
    }
}

impl fmt::Debug for PendingPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPermission")
            .field("request_code", &self.request_code)
            .finish_non_exhaustive()
    }
}
