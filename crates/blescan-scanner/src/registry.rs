//! Discovered-device registry.
//!
//! The registry maps each hardware address to the most recently observed
//! record for it. Writes come from the platform scan thread and reads from
//! the owner, so every access goes through one mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::lock_unpoisoned;
use crate::types::{DeviceRecord, FoundDevice};

/// Last-write-wins map from hardware address to record.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, DeviceRecord>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its hardware address.
    ///
    /// Returns `true` if the address was not present before.
    pub fn upsert(&self, record: DeviceRecord) -> bool {
        let address = record.hardware_address().to_string();
        lock_unpoisoned(&self.devices)
            .insert(address, record)
            .is_none()
    }

    /// Get the record stored for an address.
    pub fn get(&self, address: &str) -> Option<DeviceRecord> {
        lock_unpoisoned(&self.devices).get(address).cloned()
    }

    /// Consistent snapshot of every stored record of kind `T`.
    pub fn snapshot<T: FoundDevice>(&self) -> Vec<T> {
        lock_unpoisoned(&self.devices)
            .values()
            .filter_map(T::from_record)
            .collect()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.devices).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record.
    pub fn clear(&self) {
        lock_unpoisoned(&self.devices).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Advertisement, CallbackType, LegacyRecord, ModernRecord};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn legacy(address: &str, rssi: i32) -> DeviceRecord {
        LegacyRecord::from_advertisement(Advertisement::new(address, rssi)).into()
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let registry = DeviceRegistry::new();

        assert!(registry.upsert(legacy("A", -60)));
        assert!(registry.upsert(legacy("B", -70)));
        assert!(!registry.upsert(legacy("A", -55)));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("A").unwrap().signal_strength(), -55);
        assert_eq!(registry.get("B").unwrap().signal_strength(), -70);
    }

    #[test]
    fn test_snapshot_by_kind() {
        let registry = DeviceRegistry::new();
        registry.upsert(
            ModernRecord::from_advertisement(CallbackType::AllMatches, Advertisement::new("A", -60))
                .into(),
        );

        assert_eq!(registry.snapshot::<ModernRecord>().len(), 1);
        assert_eq!(registry.snapshot::<DeviceRecord>().len(), 1);
        assert!(registry.snapshot::<LegacyRecord>().is_empty());
    }

    #[test]
    fn test_clear() {
        let registry = DeviceRegistry::new();
        registry.upsert(legacy("A", -60));
        assert!(!registry.is_empty());

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("A").is_none());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let registry = Arc::new(DeviceRegistry::new());

        let writers: Vec<_> = (0..4)
            .map(|thread| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        registry.upsert(legacy(&format!("DEV-{}", i % 50), -(thread * 10 + 40)));
                    }
                })
            })
            .collect();

        let reader = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    assert!(registry.snapshot::<LegacyRecord>().len() <= 50);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(registry.len(), 50);
    }

    proptest! {
        #[test]
        fn prop_registry_holds_last_event_per_address(
            events in prop::collection::vec((0u8..8, -100i32..0), 0..64)
        ) {
            let registry = DeviceRegistry::new();
            let mut expected = HashMap::new();

            for (device, rssi) in &events {
                let address = format!("AA:BB:CC:DD:EE:{:02X}", device);
                registry.upsert(legacy(&address, *rssi));
                expected.insert(address, *rssi);
            }

            prop_assert_eq!(registry.len(), expected.len());
            for (address, rssi) in expected {
                prop_assert_eq!(registry.get(&address).unwrap().signal_strength(), rssi);
            }
        }
    }
}
