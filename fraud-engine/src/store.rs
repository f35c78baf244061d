//! Shared risk state behind an injected interface
//!
//! Fingerprint records and velocity history are keyed maps shared by every
//! concurrent assessment. They live behind the [`RiskStore`] trait so tests
//! can substitute a store with controlled contents, and so a persistent
//! backend can be swapped in without touching the scorers. The in-memory
//! implementation serializes read-modify-write per key through the DashMap
//! entry API; independent keys never contend on a global lock.

use crate::fingerprint::DeviceFingerprint;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Identity dimension tracked for velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Customer email address
    Email,
    /// Request IP address
    Ip,
    /// Device fingerprint id
    Device,
    /// Payment instrument token
    Card,
}

/// One recorded order observation
///
/// Each assessment leaves one event per identity dimension behind; the
/// cross-dimension fields feed the distinct-counterparty counts (distinct
/// IPs per email, distinct emails per card, and so on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Customer email on the order
    pub email: String,
    /// Request IP on the order
    pub ip: String,
    /// Resolved device fingerprint id
    pub device_id: String,
    /// Card token on the order
    pub card_token: String,
    /// IP-geolocated country at observation time
    pub country: String,
}

/// Keyed state shared across assessments
pub trait RiskStore: Send + Sync {
    /// Read a fingerprint record without mutating it
    fn load_fingerprint(&self, id: &str) -> Option<DeviceFingerprint>;

    /// Atomically create or update the fingerprint for `id`
    ///
    /// The closure receives the current record (or `None` on first
    /// observation) and returns the record to store. Implementations must
    /// serialize concurrent calls for the same id so no update is lost.
    fn upsert_fingerprint(
        &self,
        id: &str,
        update: &mut dyn FnMut(Option<DeviceFingerprint>) -> DeviceFingerprint,
    ) -> DeviceFingerprint;

    /// Append an order event to one dimension's history
    fn record_event(&self, dimension: Dimension, key: &str, event: OrderEvent);

    /// Events for a key strictly after `since`, oldest first
    ///
    /// Half-open window: an event exactly `since` old has already rolled
    /// out.
    fn events_since(&self, dimension: Dimension, key: &str, since: DateTime<Utc>)
        -> Vec<OrderEvent>;

    /// Evict fingerprints last seen before `cutoff`; returns evicted count
    fn sweep_fingerprints(&self, cutoff: DateTime<Utc>) -> usize;

    /// Drop events older than `cutoff`; returns dropped count
    fn prune_events(&self, cutoff: DateTime<Utc>) -> usize;

    /// Number of fingerprints currently tracked
    fn fingerprint_count(&self) -> usize;
}

/// In-memory `RiskStore` over concurrent hash maps
#[derive(Debug, Default)]
pub struct MemoryRiskStore {
    fingerprints: DashMap<String, DeviceFingerprint>,
    // Map: (dimension, key) -> chronological event history
    events: DashMap<(Dimension, String), Vec<OrderEvent>>,
}

impl MemoryRiskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl RiskStore for MemoryRiskStore {
    fn load_fingerprint(&self, id: &str) -> Option<DeviceFingerprint> {
        self.fingerprints.get(id).map(|fp| fp.clone())
    }

    fn upsert_fingerprint(
        &self,
        id: &str,
        update: &mut dyn FnMut(Option<DeviceFingerprint>) -> DeviceFingerprint,
    ) -> DeviceFingerprint {
        // The entry guard holds the shard lock for the whole
        // read-modify-write, which serializes racing resolves per id.
        match self.fingerprints.entry(id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let updated = update(Some(occupied.get().clone()));
                *occupied.get_mut() = updated.clone();
                updated
            }
            Entry::Vacant(vacant) => {
                let created = update(None);
                vacant.insert(created.clone());
                created
            }
        }
    }

    fn record_event(&self, dimension: Dimension, key: &str, event: OrderEvent) {
        self.events
            .entry((dimension, key.to_string()))
            .or_default()
            .push(event);
    }

    fn events_since(
        &self,
        dimension: Dimension,
        key: &str,
        since: DateTime<Utc>,
    ) -> Vec<OrderEvent> {
        match self.events.get(&(dimension, key.to_string())) {
            Some(history) => history
                .iter()
                .filter(|e| e.timestamp > since)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    fn sweep_fingerprints(&self, cutoff: DateTime<Utc>) -> usize {
        // Iterate over a snapshot of ids; remove_if re-checks under the
        // shard lock so an eviction racing a fresh resolve cannot
        // resurrect or drop an actively updated record.
        let ids: Vec<String> = self.fingerprints.iter().map(|fp| fp.key().clone()).collect();
        let mut evicted = 0;
        for id in ids {
            if self
                .fingerprints
                .remove_if(&id, |_, fp| fp.last_seen < cutoff)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    fn prune_events(&self, cutoff: DateTime<Utc>) -> usize {
        let mut dropped = 0;
        for mut history in self.events.iter_mut() {
            let before = history.len();
            history.retain(|e| e.timestamp > cutoff);
            dropped += before - history.len();
        }
        self.events.retain(|_, history| !history.is_empty());
        dropped
    }

    fn fingerprint_count(&self) -> usize {
        self.fingerprints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(at: DateTime<Utc>) -> OrderEvent {
        OrderEvent {
            timestamp: at,
            email: "a@b.com".to_string(),
            ip: "1.2.3.4".to_string(),
            device_id: "fp_test".to_string(),
            card_token: "tok_1".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_events_roll_out_of_window() {
        let store = MemoryRiskStore::new();
        let now = Utc::now();

        store.record_event(Dimension::Email, "a@b.com", event(now - Duration::days(8)));
        store.record_event(Dimension::Email, "a@b.com", event(now - Duration::hours(1)));

        let week = store.events_since(Dimension::Email, "a@b.com", now - Duration::days(7));
        assert_eq!(week.len(), 1);

        let dropped = store.prune_events(now - Duration::days(7));
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let store = MemoryRiskStore::new();
        let now = Utc::now();

        store.record_event(Dimension::Email, "a@b.com", event(now - Duration::days(7)));
        store.record_event(Dimension::Email, "a@b.com", event(now - Duration::hours(1)));

        // An event exactly seven days old has already rolled out
        let week = store.events_since(Dimension::Email, "a@b.com", now - Duration::days(7));
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].timestamp, now - Duration::hours(1));
    }

    #[test]
    fn test_sweep_respects_cutoff() {
        let store = MemoryRiskStore::new();
        let now = Utc::now();

        store.upsert_fingerprint("fp_old", &mut |_| {
            let mut fp = DeviceFingerprint::new("fp_old", now);
            fp.last_seen = now - Duration::days(120);
            fp
        });
        store.upsert_fingerprint("fp_live", &mut |_| {
            DeviceFingerprint::new("fp_live", now)
        });

        let evicted = store.sweep_fingerprints(now - Duration::days(90));
        assert_eq!(evicted, 1);
        assert!(store.load_fingerprint("fp_old").is_none());
        assert!(store.load_fingerprint("fp_live").is_some());
    }

    #[test]
    fn test_upsert_first_observation() {
        let store = MemoryRiskStore::new();
        let now = Utc::now();

        let fp = store.upsert_fingerprint("fp_x", &mut |current| {
            assert!(current.is_none());
            DeviceFingerprint::new("fp_x", now)
        });
        assert_eq!(fp.use_count, 1);
        assert_eq!(store.fingerprint_count(), 1);
    }
}
