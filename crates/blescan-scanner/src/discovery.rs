//! Discovery event fan-out.
//!
//! Every discovery runs through [`DiscoveryHub`]: the record is stored in
//! the registry, then the default callback runs, then the callback specific
//! to the record kind, then the event is published on the broadcast stream.
//! Subscribers may rely on this order.
//!
//! ```text
//!                      ┌──────────────┐
//!                 ┌───►│  Registry    │  (upsert)
//!                 │    └──────────────┘
//! ┌──────────┐    │    ┌──────────────┐
//! │ Backend  │────┼───►│  Default cb  │  (address, rssi, payload)
//! │ callback │    │    └──────────────┘
//! └──────────┘    │    ┌──────────────┐
//!                 ├───►│ Specific cb  │  (&LegacyRecord / &ModernRecord)
//!                 │    └──────────────┘
//!                 │    ┌──────────────┐
//!                 └───►│  broadcast   │──────► subscribers
//!                      └──────────────┘
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::registry::DeviceRegistry;
use crate::types::{BackendKind, DeviceRecord, LegacyRecord, ModernRecord};
use crate::{read_unpoisoned, write_unpoisoned};

/// Callback receiving `(hardware_address, signal_strength, raw_advertisement)`
/// for every discovery of either backend.
pub type DefaultCallback = Arc<dyn Fn(&str, i32, Option<&[u8]>) + Send + Sync>;

/// Callback receiving every legacy record.
pub type LegacyCallback = Arc<dyn Fn(&LegacyRecord) + Send + Sync>;

/// Callback receiving every modern record.
pub type ModernCallback = Arc<dyn Fn(&ModernRecord) + Send + Sync>;

/// Event published on the scanner's broadcast stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanEvent {
    /// A device advertisement was received and stored.
    DeviceFound(DeviceRecord),

    /// The backend started a platform scan.
    ScanStarted(BackendKind),

    /// The backend stopped its platform scan.
    ScanStopped(BackendKind),

    /// The platform reported that the scan could not run.
    ScanFailed {
        /// Platform error code.
        error_code: i32,
    },
}

#[derive(Default)]
struct Callbacks {
    default: Option<DefaultCallback>,
    legacy: Option<LegacyCallback>,
    modern: Option<ModernCallback>,
}

/// Registry plus subscribers shared between a backend and the facade.
pub struct DiscoveryHub {
    registry: DeviceRegistry,
    callbacks: RwLock<Callbacks>,
    events: broadcast::Sender<ScanEvent>,
}

impl DiscoveryHub {
    /// Create a hub whose broadcast stream buffers `capacity` events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));

        Self {
            registry: DeviceRegistry::new(),
            callbacks: RwLock::new(Callbacks::default()),
            events,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn set_default_callback(&self, callback: DefaultCallback) {
        write_unpoisoned(&self.callbacks).default = Some(callback);
    }

    pub fn set_legacy_callback(&self, callback: LegacyCallback) {
        write_unpoisoned(&self.callbacks).legacy = Some(callback);
    }

    pub fn set_modern_callback(&self, callback: ModernCallback) {
        write_unpoisoned(&self.callbacks).modern = Some(callback);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Store a legacy discovery and notify subscribers.
    pub fn record_legacy(&self, record: LegacyRecord) {
        self.registry.upsert(record.clone().into());

        // Clone out of the lock so callbacks may call back into the scanner
        let (default, legacy) = {
            let callbacks = read_unpoisoned(&self.callbacks);
            (callbacks.default.clone(), callbacks.legacy.clone())
        };

        if let Some(default) = default {
            default(
                &record.hardware_address,
                record.signal_strength,
                record.raw_advertisement.as_deref(),
            );
        }
        if let Some(legacy) = legacy {
            legacy(&record);
        }

        self.publish(ScanEvent::DeviceFound(record.into()));
    }

    /// Store a modern discovery and notify subscribers.
    pub fn record_modern(&self, record: ModernRecord) {
        self.registry.upsert(record.clone().into());

        let (default, modern) = {
            let callbacks = read_unpoisoned(&self.callbacks);
            (callbacks.default.clone(), callbacks.modern.clone())
        };

        if let Some(default) = default {
            default(
                &record.hardware_address,
                record.signal_strength,
                record.raw_advertisement.as_deref(),
            );
        }
        if let Some(modern) = modern {
            modern(&record);
        }

        self.publish(ScanEvent::DeviceFound(record.into()));
    }

    /// Publish an event; having no subscribers is not an error.
    pub fn publish(&self, event: ScanEvent) {
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for DiscoveryHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryHub")
            .field("registry", &self.registry)
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}
