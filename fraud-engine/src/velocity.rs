//! Multi-dimensional velocity tracking
//!
//! Rolling-window order counts and distinct-counterparty cardinalities per
//! email, IP, device and card. Counts are anchored at "now" when the
//! snapshot is read; stale events roll out of the window lazily and are
//! physically dropped by the background sweep. A snapshot reports prior
//! activity only, then records the current order, so a burst of concurrent
//! orders on one key leaves exactly one event behind per order.

use crate::clock::Clock;
use crate::store::{Dimension, OrderEvent, RiskStore};
use crate::types::{CardType, OrderContext};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Email-dimension window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVelocity {
    /// Email address
    pub address: String,
    /// Prior orders in the last 24 hours
    pub order_count_24h: u32,
    /// Prior orders in the last 7 days
    pub order_count_week: u32,
    /// First order in the retained history
    pub first_order: Option<DateTime<Utc>>,
    /// Most recent order in the retained history
    pub last_order: Option<DateTime<Utc>>,
    /// Distinct IPs seen for this email
    pub distinct_ips: u32,
    /// Distinct devices seen for this email
    pub distinct_devices: u32,
}

/// IP-dimension window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpVelocity {
    /// IP address
    pub address: String,
    /// Prior orders in the last 24 hours
    pub order_count_24h: u32,
    /// Prior orders in the last 7 days
    pub order_count_week: u32,
    /// Distinct emails seen from this IP
    pub distinct_emails: u32,
    /// Distinct cards seen from this IP
    pub distinct_cards: u32,
    /// VPN exit detected on the current request
    pub vpn_detected: bool,
    /// Open proxy detected on the current request
    pub proxy_detected: bool,
}

/// Device-dimension window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceVelocity {
    /// Fingerprint id
    pub fingerprint_id: String,
    /// Prior orders in the last 24 hours
    pub order_count_24h: u32,
    /// Prior orders in the last 7 days
    pub order_count_week: u32,
    /// Distinct emails seen on this device
    pub distinct_emails: u32,
    /// Distinct cards seen on this device
    pub distinct_cards: u32,
    /// Country transitions across the device's order history
    pub location_changes: u32,
}

/// Card-dimension window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardVelocity {
    /// Last four digits
    pub last4: String,
    /// Card BIN
    pub bin: String,
    /// Prior orders in the last 24 hours
    pub order_count_24h: u32,
    /// Prior orders in the last 7 days
    pub order_count_week: u32,
    /// Distinct emails seen on this card
    pub distinct_emails: u32,
    /// Distinct IPs seen on this card
    pub distinct_ips: u32,
    /// Known chargebacks against this instrument
    pub prior_chargebacks: u32,
    /// Issuer country
    pub issuer_country: String,
    /// Card product type
    pub card_type: CardType,
}

/// Snapshot across all four identity dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityCheck {
    /// Email dimension
    pub email: EmailVelocity,
    /// IP dimension
    pub ip: IpVelocity,
    /// Device dimension
    pub device: DeviceVelocity,
    /// Card dimension
    pub card: CardVelocity,
}

/// Tracks rolling-window order activity per identity dimension
pub struct VelocityTracker {
    store: Arc<dyn RiskStore>,
    clock: Arc<dyn Clock>,
}

impl VelocityTracker {
    /// Create a tracker over the given store and clock
    pub fn new(store: Arc<dyn RiskStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Read prior activity for the order's identities, then record the order
    ///
    /// Zero history is a legitimate new-identity state and yields zero
    /// counts, never an error.
    pub fn snapshot(&self, ctx: &OrderContext, device_id: &str) -> VelocityCheck {
        let now = self.clock.now();
        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);

        let email_key = ctx.customer.email.as_str();
        let ip_key = ctx.ip.ip.as_str();
        let card_key = ctx.payment.card_token.as_str();

        let email_events = self.store.events_since(Dimension::Email, email_key, week_ago);
        let ip_events = self.store.events_since(Dimension::Ip, ip_key, week_ago);
        let device_events = self.store.events_since(Dimension::Device, device_id, week_ago);
        let card_events = self.store.events_since(Dimension::Card, card_key, week_ago);

        let check = VelocityCheck {
            email: EmailVelocity {
                address: email_key.to_string(),
                order_count_24h: count_since(&email_events, day_ago),
                order_count_week: email_events.len() as u32,
                first_order: email_events.first().map(|e| e.timestamp),
                last_order: email_events.last().map(|e| e.timestamp),
                distinct_ips: distinct(&email_events, |e| e.ip.as_str()),
                distinct_devices: distinct(&email_events, |e| e.device_id.as_str()),
            },
            ip: IpVelocity {
                address: ip_key.to_string(),
                order_count_24h: count_since(&ip_events, day_ago),
                order_count_week: ip_events.len() as u32,
                distinct_emails: distinct(&ip_events, |e| e.email.as_str()),
                distinct_cards: distinct(&ip_events, |e| e.card_token.as_str()),
                vpn_detected: ctx.ip.vpn_detected,
                proxy_detected: ctx.ip.proxy_detected,
            },
            device: DeviceVelocity {
                fingerprint_id: device_id.to_string(),
                order_count_24h: count_since(&device_events, day_ago),
                order_count_week: device_events.len() as u32,
                distinct_emails: distinct(&device_events, |e| e.email.as_str()),
                distinct_cards: distinct(&device_events, |e| e.card_token.as_str()),
                location_changes: country_transitions(&device_events),
            },
            card: CardVelocity {
                last4: ctx.payment.card_last4.clone(),
                bin: ctx.payment.card_bin.clone(),
                order_count_24h: count_since(&card_events, day_ago),
                order_count_week: card_events.len() as u32,
                distinct_emails: distinct(&card_events, |e| e.email.as_str()),
                distinct_ips: distinct(&card_events, |e| e.ip.as_str()),
                prior_chargebacks: ctx.payment.prior_chargebacks,
                issuer_country: ctx.payment.issuer_country.clone(),
                card_type: ctx.payment.card_type,
            },
        };

        self.record(ctx, device_id, now);

        check
    }

    fn record(&self, ctx: &OrderContext, device_id: &str, now: DateTime<Utc>) {
        let event = OrderEvent {
            timestamp: now,
            email: ctx.customer.email.clone(),
            ip: ctx.ip.ip.clone(),
            device_id: device_id.to_string(),
            card_token: ctx.payment.card_token.clone(),
            country: ctx.ip.country.clone(),
        };

        self.store
            .record_event(Dimension::Email, &ctx.customer.email, event.clone());
        self.store.record_event(Dimension::Ip, &ctx.ip.ip, event.clone());
        self.store.record_event(Dimension::Device, device_id, event.clone());
        self.store
            .record_event(Dimension::Card, &ctx.payment.card_token, event);
    }
}

fn count_since(events: &[OrderEvent], since: DateTime<Utc>) -> u32 {
    events.iter().filter(|e| e.timestamp > since).count() as u32
}

fn distinct<'a>(events: &'a [OrderEvent], field: impl Fn(&'a OrderEvent) -> &'a str) -> u32 {
    events
        .iter()
        .map(field)
        .filter(|v| !v.is_empty())
        .collect::<HashSet<_>>()
        .len() as u32
}

fn country_transitions(events: &[OrderEvent]) -> u32 {
    events
        .iter()
        .zip(events.iter().skip(1))
        .filter(|(a, b)| a.country != b.country)
        .count() as u32
}

/// Velocity component score, 0-1000
///
/// Threshold tiers per dimension, summed and capped. The tiers are fixed
/// heuristics tuned against historical fraud bursts, not trained parameters.
pub fn velocity_score(check: &VelocityCheck) -> u32 {
    let mut score = 0;

    // Email dimension
    if check.email.order_count_24h > 5 {
        score += 200;
    } else if check.email.order_count_24h > 3 {
        score += 100;
    } else if check.email.order_count_24h > 1 {
        score += 50;
    }
    if check.email.distinct_ips > 3 {
        score += 150;
    }
    if check.email.distinct_devices > 2 {
        score += 100;
    }

    // IP dimension
    if check.ip.order_count_24h > 10 {
        score += 300;
    } else if check.ip.order_count_24h > 5 {
        score += 150;
    } else if check.ip.order_count_24h > 2 {
        score += 75;
    }
    if check.ip.distinct_emails > 5 {
        score += 200;
    }
    if check.ip.vpn_detected {
        score += 100;
    }
    if check.ip.proxy_detected {
        score += 150;
    }

    // Device dimension
    if check.device.order_count_24h > 3 {
        score += 200;
    }
    if check.device.distinct_emails > 2 {
        score += 150;
    }
    if check.device.location_changes > 5 {
        score += 100;
    }

    // Card dimension
    if check.card.order_count_24h > 5 {
        score += 250;
    }
    if check.card.distinct_emails > 3 {
        score += 200;
    }
    if check.card.prior_chargebacks > 0 {
        score += 300;
    }

    score.min(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryRiskStore;
    use crate::types::{BillingAddress, CustomerProfile, DeviceTelemetry, IpGeo, PaymentDetails};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn context(email: &str, ip: &str, card: &str) -> OrderContext {
        OrderContext {
            customer: CustomerProfile {
                email: email.to_string(),
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                total_orders: 3,
                total_spent: Decimal::from(300),
                chargeback_count: 0,
                dispute_count: 0,
            },
            payment: PaymentDetails {
                card_token: card.to_string(),
                card_last4: "4242".to_string(),
                card_bin: "424242".to_string(),
                issuer_country: "US".to_string(),
                card_type: CardType::Credit,
                amount: Decimal::from(100),
                prior_chargebacks: 0,
            },
            ip: IpGeo {
                ip: ip.to_string(),
                country: "US".to_string(),
                city: "Columbus".to_string(),
                coords: None,
                vpn_detected: false,
                proxy_detected: false,
            },
            billing: BillingAddress {
                country: "US".to_string(),
                city: "Columbus".to_string(),
                coords: None,
            },
            telemetry: DeviceTelemetry::default(),
        }
    }

    fn tracker() -> (VelocityTracker, Arc<ManualClock>, Arc<MemoryRiskStore>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 8, 18, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryRiskStore::new());
        (
            VelocityTracker::new(store.clone(), clock.clone()),
            clock,
            store,
        )
    }

    #[test]
    fn test_first_order_yields_zero_counts() {
        let (tracker, _clock, _store) = tracker();
        let ctx = context("new@example.com", "198.51.100.7", "tok_new");

        let check = tracker.snapshot(&ctx, "fp_new");

        assert_eq!(check.email.order_count_24h, 0);
        assert_eq!(check.email.order_count_week, 0);
        assert_eq!(check.ip.distinct_emails, 0);
        assert_eq!(check.card.distinct_ips, 0);
        assert!(check.email.first_order.is_none());
        assert_eq!(velocity_score(&check), 0);
    }

    #[test]
    fn test_snapshot_reports_prior_orders_only() {
        let (tracker, clock, _store) = tracker();
        let ctx = context("rep@example.com", "198.51.100.8", "tok_rep");

        for _ in 0..3 {
            tracker.snapshot(&ctx, "fp_rep");
            clock.advance(Duration::minutes(5));
        }

        let check = tracker.snapshot(&ctx, "fp_rep");
        assert_eq!(check.email.order_count_24h, 3);
        assert_eq!(check.ip.order_count_24h, 3);
        assert_eq!(check.device.order_count_24h, 3);
        assert_eq!(check.card.order_count_24h, 3);
    }

    #[test]
    fn test_stale_orders_roll_out_of_both_windows() {
        let (tracker, clock, _store) = tracker();
        let ctx = context("old@example.com", "198.51.100.9", "tok_old");

        tracker.snapshot(&ctx, "fp_old");
        clock.advance(Duration::hours(30));
        tracker.snapshot(&ctx, "fp_old");
        clock.advance(Duration::days(7));

        let check = tracker.snapshot(&ctx, "fp_old");
        assert_eq!(check.email.order_count_24h, 0);
        assert_eq!(check.email.order_count_week, 0);
    }

    #[test]
    fn test_exactly_aged_order_leaves_the_day_window() {
        let (tracker, clock, _store) = tracker();
        let ctx = context("edge@example.com", "198.51.100.10", "tok_edge");

        tracker.snapshot(&ctx, "fp_edge");
        clock.advance(Duration::hours(24));

        let check = tracker.snapshot(&ctx, "fp_edge");
        assert_eq!(check.email.order_count_24h, 0);
        assert_eq!(check.email.order_count_week, 1);
    }

    #[test]
    fn test_distinct_counterparties_per_ip() {
        let (tracker, clock, _store) = tracker();
        let ip = "203.0.113.50";

        for i in 0..6 {
            let ctx = context(&format!("mule{i}@example.com"), ip, &format!("tok_{i}"));
            tracker.snapshot(&ctx, &format!("fp_{i}"));
            clock.advance(Duration::minutes(1));
        }

        let probe = context("probe@example.com", ip, "tok_probe");
        let check = tracker.snapshot(&probe, "fp_probe");

        assert_eq!(check.ip.order_count_24h, 6);
        assert_eq!(check.ip.distinct_emails, 6);
        assert_eq!(check.ip.distinct_cards, 6);
        // 6 prior orders (>5 tier) + 6 distinct emails (>5)
        assert_eq!(velocity_score(&check), 150 + 200);
    }

    #[test]
    fn test_score_tiers_and_cap() {
        let base = {
            let (tracker, _clock, _store) = tracker();
            let ctx = context("t@example.com", "192.0.2.1", "tok_t");
            tracker.snapshot(&ctx, "fp_t")
        };

        let mut check = base.clone();
        check.email.order_count_24h = 2;
        assert_eq!(velocity_score(&check), 50);
        check.email.order_count_24h = 4;
        assert_eq!(velocity_score(&check), 100);
        check.email.order_count_24h = 6;
        assert_eq!(velocity_score(&check), 200);

        let mut vpn = base.clone();
        vpn.ip.vpn_detected = true;
        vpn.ip.proxy_detected = true;
        assert_eq!(velocity_score(&vpn), 250);

        let mut maxed = base;
        maxed.email.order_count_24h = 10;
        maxed.email.distinct_ips = 10;
        maxed.email.distinct_devices = 10;
        maxed.ip.order_count_24h = 20;
        maxed.ip.distinct_emails = 10;
        maxed.ip.vpn_detected = true;
        maxed.ip.proxy_detected = true;
        maxed.device.order_count_24h = 10;
        maxed.device.distinct_emails = 10;
        maxed.device.location_changes = 10;
        maxed.card.order_count_24h = 10;
        maxed.card.distinct_emails = 10;
        maxed.card.prior_chargebacks = 2;
        assert_eq!(velocity_score(&maxed), 1000);
    }
}
