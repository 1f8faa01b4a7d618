//! The shared device registry.
//!
//! One [`DeviceRegistry`] exists per station; every discovery listener
//! upserts into it and the control plane reads from it. All operations
//! are safe to call concurrently -- the lock is scoped to short critical
//! sections and is never held across I/O.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rigbridge_core::{DeviceId, RadioDescriptor};

use crate::record::DiscoveryRecord;

/// Thread-safe table of every known device, discovered or manual.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: RwLock<HashMap<DeviceId, DiscoveryRecord>>,
    /// Count of unparseable datagrams across all listeners.
    malformed: AtomicU64,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every known descriptor.
    pub fn list(&self) -> Vec<RadioDescriptor> {
        let records = self.records.read().unwrap();
        records.values().map(|r| r.descriptor.clone()).collect()
    }

    /// Look up one record by id.
    pub fn get(&self, id: &DeviceId) -> Option<DiscoveryRecord> {
        let records = self.records.read().unwrap();
        records.get(id).cloned()
    }

    /// Insert or refresh a record.
    ///
    /// Returns `true` when the device was not previously known -- the
    /// caller emits `DeviceDiscovered` exactly for those. Re-broadcasts
    /// within the expiry window refresh `last_seen` without producing a
    /// second descriptor.
    pub fn upsert(&self, record: DiscoveryRecord) -> bool {
        let mut records = self.records.write().unwrap();
        records.insert(record.descriptor.id.clone(), record).is_none()
    }

    /// Add a manually-configured device. Same newness contract as
    /// [`upsert`](DeviceRegistry::upsert); manual records never expire.
    pub fn add_manual(&self, descriptor: RadioDescriptor) -> bool {
        self.upsert(DiscoveryRecord::manual(descriptor))
    }

    /// Remove a device explicitly. Returns `true` if it was present.
    pub fn remove(&self, id: &DeviceId) -> bool {
        let mut records = self.records.write().unwrap();
        records.remove(id).is_some()
    }

    /// Evict every record silent past its expiry threshold, returning the
    /// evicted ids so the caller can emit `DeviceRemoved` for each.
    pub fn expire_stale(&self, now: Instant) -> Vec<DeviceId> {
        let mut records = self.records.write().unwrap();
        let expired: Vec<DeviceId> = records
            .iter()
            .filter(|(_, rec)| rec.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            records.remove(id);
        }
        expired
    }

    /// Number of known devices.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record one dropped, unparseable datagram.
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total unparseable datagrams dropped since startup.
    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::time::Duration;

    use rigbridge_core::{DeviceFamily, DeviceOrigin};

    use crate::record::DiscoveryAnnouncement;

    fn record(serial: &str) -> DiscoveryRecord {
        let line = format!("sdr6k serial={serial} port=4992 model=FLEX-6600 interval=1");
        let src: IpAddr = "10.0.0.9".parse().unwrap();
        let ann = DiscoveryAnnouncement::parse(&line, src).unwrap();
        DiscoveryRecord::from_announcement(&ann, DeviceFamily::SocketTransceiver)
    }

    #[test]
    fn duplicate_broadcasts_do_not_duplicate_devices() {
        let registry = DeviceRegistry::new();

        assert!(registry.upsert(record("AA01")));
        for _ in 0..10 {
            assert!(!registry.upsert(record("AA01")));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_serials_are_distinct_devices() {
        let registry = DeviceRegistry::new();
        assert!(registry.upsert(record("AA01")));
        assert!(registry.upsert(record("BB02")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn expire_stale_evicts_silent_discovered_devices() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("AA01"));

        let rec = registry.get(&rigbridge_core::DeviceId::new("sdr6k:AA01")).unwrap();
        let past_expiry = rec.last_seen + Duration::from_secs(4);

        let expired = registry.expire_stale(past_expiry);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].as_str(), "sdr6k:AA01");
        assert!(registry.is_empty());

        // A second sweep finds nothing; eviction is observed exactly once.
        assert!(registry.expire_stale(past_expiry).is_empty());
    }

    #[test]
    fn manual_devices_survive_expiry() {
        let registry = DeviceRegistry::new();
        let mut rec = record("AA01");
        rec.descriptor.origin = DeviceOrigin::Manual;
        let id = rec.descriptor.id.clone();
        registry.upsert(rec);

        let far_future = Instant::now() + Duration::from_secs(3600);
        assert!(registry.expire_stale(far_future).is_empty());
        assert!(registry.get(&id).is_some());
    }

    #[test]
    fn refresh_resets_expiry_clock() {
        let registry = DeviceRegistry::new();
        registry.upsert(record("AA01"));

        // Refresh with a new record (fresh last_seen); sweep at a time
        // that would have expired the original.
        std::thread::sleep(Duration::from_millis(10));
        registry.upsert(record("AA01"));
        let rec = registry.get(&rigbridge_core::DeviceId::new("sdr6k:AA01")).unwrap();

        let expired = registry.expire_stale(rec.last_seen + Duration::from_secs(2));
        assert!(expired.is_empty());
    }

    #[test]
    fn malformed_counter() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.malformed_count(), 0);
        registry.record_malformed();
        registry.record_malformed();
        assert_eq!(registry.malformed_count(), 2);
    }
}
