//! Device fingerprint identity resolution
//!
//! A fingerprint id is a pure function of the canonicalized telemetry tuple:
//! identical telemetry always resolves to the same identity, regardless of
//! the order font and plugin lists were collected in. The registry keeps
//! per-identity history (bounded location ring, use count) and recomputes a
//! 0-100 device risk score on every observation.

use crate::clock::Clock;
use crate::store::RiskStore;
use crate::types::{DeviceTelemetry, IpGeo};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

/// Maximum retained location observations per fingerprint
pub const MAX_LOCATIONS: usize = 50;

/// One location observation for a fingerprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationObservation {
    /// IP address observed
    pub ip: String,
    /// Country observed
    pub country: String,
    /// City observed
    pub city: String,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}

/// Stable device identity with per-identity history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    /// Derived identity, stable across observations of the same telemetry
    pub id: String,
    /// First observation time
    pub first_seen: DateTime<Utc>,
    /// Most recent observation time
    pub last_seen: DateTime<Utc>,
    /// Observations of this identity
    pub use_count: u64,
    /// Bounded location history, oldest first
    pub locations: VecDeque<LocationObservation>,
    /// Derived device risk score, 0-100
    pub risk_score: u32,
}

impl DeviceFingerprint {
    /// Fresh record for a first observation
    pub fn new(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            first_seen: now,
            last_seen: now,
            use_count: 1,
            locations: VecDeque::with_capacity(MAX_LOCATIONS),
            risk_score: 0,
        }
    }

    /// Append a location observation, evicting the oldest past the cap
    pub fn observe_location(&mut self, geo: &IpGeo, now: DateTime<Utc>) {
        if self.locations.len() == MAX_LOCATIONS {
            self.locations.pop_front();
        }
        self.locations.push_back(LocationObservation {
            ip: geo.ip.clone(),
            country: geo.country.clone(),
            city: geo.city.clone(),
            timestamp: now,
        });
    }

    /// Distinct countries across the stored location history
    pub fn distinct_countries(&self) -> usize {
        self.locations
            .iter()
            .map(|l| l.country.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Country transitions across consecutive stored locations
    pub fn location_changes(&self) -> usize {
        self.locations
            .iter()
            .zip(self.locations.iter().skip(1))
            .filter(|(a, b)| a.country != b.country)
            .count()
    }

    /// True when at least three of the last five locations landed inside
    /// one hour, a pattern consistent with scripted reuse
    fn rapid_location_churn(&self) -> bool {
        let recent: Vec<_> = self.locations.iter().rev().take(5).collect();
        if recent.len() < 3 {
            return false;
        }
        // reversed, so first is newest
        match (recent.first(), recent.last()) {
            (Some(newest), Some(oldest)) => {
                newest.timestamp - oldest.timestamp < Duration::hours(1)
            }
            _ => false,
        }
    }
}

/// Deterministic fingerprint id from the canonicalized telemetry tuple
pub fn fingerprint_id(telemetry: &DeviceTelemetry) -> String {
    let mut fonts = telemetry.fonts.clone();
    fonts.sort();
    let mut plugins = telemetry.plugins.clone();
    plugins.sort();

    let tuple = [
        telemetry.user_agent.as_str(),
        &telemetry.screen.width.to_string(),
        &telemetry.screen.height.to_string(),
        &telemetry.screen.color_depth.to_string(),
        telemetry.timezone.as_str(),
        telemetry.language.as_str(),
        telemetry.platform.as_str(),
        telemetry.canvas.as_str(),
        telemetry.webgl.as_str(),
        &fonts.join(","),
        &plugins.join(","),
    ]
    .join("|");

    let digest = Sha256::digest(tuple.as_bytes());
    let mut id = String::with_capacity(35);
    id.push_str("fp_");
    for byte in digest.iter().take(16) {
        // infallible for String
        let _ = write!(id, "{:02x}", byte);
    }
    id
}

/// Resolves telemetry to fingerprint identities and maintains their history
pub struct DeviceFingerprintRegistry {
    store: Arc<dyn RiskStore>,
    clock: Arc<dyn Clock>,
}

impl DeviceFingerprintRegistry {
    /// Create a registry over the given store and clock
    pub fn new(store: Arc<dyn RiskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Resolve telemetry to its fingerprint, updating per-identity state
    ///
    /// Never fails: missing telemetry fields hash as empty values and show
    /// up as weak-fingerprint risk instead of an error.
    pub fn resolve(&self, telemetry: &DeviceTelemetry, geo: Option<&IpGeo>) -> DeviceFingerprint {
        let id = fingerprint_id(telemetry);
        let now = self.clock.now();

        self.store.upsert_fingerprint(&id, &mut |current| {
            let mut fp = match current {
                Some(mut existing) => {
                    existing.last_seen = now;
                    existing.use_count += 1;
                    existing
                }
                None => DeviceFingerprint::new(&id, now),
            };
            if let Some(geo) = geo {
                fp.observe_location(geo, now);
            }
            fp.risk_score = device_risk_score(&fp, telemetry);
            fp
        })
    }
}

/// Derived device risk score, 0-100
///
/// Novelty, country spread and weak-fingerprint signals. Recomputed on
/// every observation so the stored score always reflects current history.
pub fn device_risk_score(fp: &DeviceFingerprint, telemetry: &DeviceTelemetry) -> u32 {
    let mut risk = 0;

    if fp.use_count == 1 {
        risk += 20;
    }
    if fp.locations.len() > 10 {
        risk += 20;
    }
    if fp.distinct_countries() > 3 {
        risk += 40;
    }

    // Weak fingerprint: privacy tooling or sparse telemetry
    if telemetry.canvas.len() < 10 {
        risk += 10;
    }
    if telemetry.fonts.len() < 10 {
        risk += 5;
    }
    if !telemetry.cookies_enabled {
        risk += 10;
    }

    risk.min(100)
}

/// Device component score for aggregation, 0-1000
pub fn device_score(fp: &DeviceFingerprint, telemetry: &DeviceTelemetry) -> u32 {
    let mut score = 0;

    if fp.use_count == 1 {
        score += 50;
    }
    if fp.locations.len() > 10 {
        score += 100;
    }
    if fp.distinct_countries() > 3 {
        score += 150;
    }

    if fp.rapid_location_churn() {
        score += 200;
    }

    if telemetry.canvas.len() < 10 {
        score += 75;
    }
    if telemetry.fonts.len() < 10 {
        score += 50;
    }
    if !telemetry.cookies_enabled {
        score += 100;
    }

    score.min(1000)
}
