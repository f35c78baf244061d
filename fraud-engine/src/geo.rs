//! Geographic and payment-instrument scoring
//!
//! Two stateless pure functions over the order context and the static risk
//! tables. No shared state, fully deterministic given inputs.

use crate::config::RiskConfig;
use crate::types::{CardType, GeoPoint, OrderContext};
use rust_decimal::Decimal;
use std::sync::Arc;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// IP-to-billing distance when both sides carry coordinates
pub fn ip_billing_distance_km(ctx: &OrderContext) -> Option<f64> {
    match (ctx.ip.coords, ctx.billing.coords) {
        (Some(ip), Some(billing)) => Some(haversine_km(ip, billing)),
        _ => None,
    }
}

/// Stateless geographic and payment scorers over the static risk tables
pub struct GeoPaymentScorer {
    config: Arc<RiskConfig>,
}

impl GeoPaymentScorer {
    /// Create a scorer over the given risk tables
    pub fn new(config: Arc<RiskConfig>) -> Self {
        Self { config }
    }

    /// Geographic component score, 0-1000
    ///
    /// Country mismatch, high-risk country membership and banded
    /// IP-to-billing distance. Unknown coordinates contribute nothing.
    pub fn geographic_score(&self, ctx: &OrderContext) -> u32 {
        let mut score = 0;

        let ip_country = ctx.ip.country.as_str();
        let billing_country = ctx.billing.country.as_str();

        if ip_country != billing_country {
            score += 150;

            if self.config.is_high_risk_country(ip_country)
                || self.config.is_high_risk_country(billing_country)
            {
                score += 200;
            }
        }

        if let Some(distance) = ip_billing_distance_km(ctx) {
            if distance > 1000.0 {
                score += 200;
            } else if distance > 500.0 {
                score += 100;
            } else if distance > 100.0 {
                score += 50;
            }
        }

        if self.config.is_high_risk_country(billing_country) {
            score += 100;
        }

        score.min(1000)
    }

    /// Payment component score, 0-1000
    ///
    /// Card product type, issuer-country mismatch, high-risk BIN prefixes
    /// and order-value escalation against fixed thresholds and the
    /// customer's own history.
    pub fn payment_score(&self, ctx: &OrderContext) -> u32 {
        let mut score = 0;

        if ctx.payment.card_type == CardType::Prepaid {
            score += 150;
        }

        if self.config.is_high_risk_bin(&ctx.payment.card_bin) {
            score += 200;
        }

        if ctx.payment.issuer_country != ctx.billing.country {
            score += 100;
        }

        if ctx.payment.amount > Decimal::from(500) {
            score += 100;
        }
        if ctx.payment.amount > Decimal::from(1000) {
            score += 200;
        }

        // Only meaningful once the customer has a purchase history
        let average = ctx.customer.average_order_value();
        if average > Decimal::ZERO && ctx.payment.amount > average * Decimal::from(5) {
            score += 150;
        }

        score.min(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BillingAddress, CustomerProfile, DeviceTelemetry, IpGeo, PaymentDetails,
    };
    use chrono::{TimeZone, Utc};

    const PARIS: GeoPoint = GeoPoint { lat: 48.8566, lon: 2.3522 };
    const VERSAILLES: GeoPoint = GeoPoint { lat: 48.8049, lon: 2.1204 };
    const BERLIN: GeoPoint = GeoPoint { lat: 52.5200, lon: 13.4050 };
    const WARSAW: GeoPoint = GeoPoint { lat: 52.2297, lon: 21.0122 };

    fn context() -> OrderContext {
        OrderContext {
            customer: CustomerProfile {
                email: "buyer@example.com".to_string(),
                created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
                total_orders: 10,
                total_spent: Decimal::from(1000),
                chargeback_count: 0,
                dispute_count: 0,
            },
            payment: PaymentDetails {
                card_token: "tok_test".to_string(),
                card_last4: "0005".to_string(),
                card_bin: "371449".to_string(),
                issuer_country: "FR".to_string(),
                card_type: CardType::Credit,
                amount: Decimal::from(100),
                prior_chargebacks: 0,
            },
            ip: IpGeo {
                ip: "192.0.2.10".to_string(),
                country: "FR".to_string(),
                city: "Paris".to_string(),
                coords: Some(PARIS),
                vpn_detected: false,
                proxy_detected: false,
            },
            billing: BillingAddress {
                country: "FR".to_string(),
                city: "Paris".to_string(),
                coords: Some(PARIS),
            },
            telemetry: DeviceTelemetry::default(),
        }
    }

    fn scorer() -> GeoPaymentScorer {
        GeoPaymentScorer::new(Arc::new(RiskConfig::default()))
    }

    #[test]
    fn test_haversine_known_distances() {
        let paris_berlin = haversine_km(PARIS, BERLIN);
        assert!((paris_berlin - 878.0).abs() < 15.0, "got {paris_berlin}");

        let paris_warsaw = haversine_km(PARIS, WARSAW);
        assert!(paris_warsaw > 1300.0 && paris_warsaw < 1450.0, "got {paris_warsaw}");

        assert!(haversine_km(PARIS, PARIS) < 1e-6);
    }

    #[test]
    fn test_geographic_baseline_is_zero() {
        assert_eq!(scorer().geographic_score(&context()), 0);
    }

    #[test]
    fn test_geographic_distance_bands() {
        let mut ctx = context();

        ctx.billing.coords = Some(VERSAILLES); // ~17 km
        assert_eq!(scorer().geographic_score(&ctx), 0);

        ctx.billing.coords = Some(BERLIN); // ~878 km
        ctx.billing.country = "FR".to_string();
        assert_eq!(scorer().geographic_score(&ctx), 100);

        ctx.billing.coords = Some(WARSAW); // ~1365 km
        assert_eq!(scorer().geographic_score(&ctx), 200);

        ctx.billing.coords = None;
        assert_eq!(scorer().geographic_score(&ctx), 0);
    }

    #[test]
    fn test_geographic_country_mismatch_and_high_risk() {
        let mut ctx = context();
        ctx.ip.coords = None;
        ctx.billing.coords = None;

        ctx.billing.country = "DE".to_string();
        assert_eq!(scorer().geographic_score(&ctx), 150);

        // Mismatch where one side is high-risk, and the billing country
        // itself carries the flat high-risk penalty
        ctx.billing.country = "NG".to_string();
        assert_eq!(scorer().geographic_score(&ctx), 150 + 200 + 100);
    }

    #[test]
    fn test_payment_thresholds() {
        let mut ctx = context();

        ctx.payment.amount = Decimal::from(600);
        assert_eq!(scorer().payment_score(&ctx), 100 + 150); // >500 and >5x avg of 100

        ctx.payment.amount = Decimal::from(1500);
        assert_eq!(scorer().payment_score(&ctx), 100 + 200 + 150);
    }

    #[test]
    fn test_payment_instrument_signals() {
        let mut ctx = context();

        ctx.payment.card_type = CardType::Prepaid;
        assert_eq!(scorer().payment_score(&ctx), 150);

        ctx.payment.card_bin = "411111".to_string();
        assert_eq!(scorer().payment_score(&ctx), 150 + 200);

        ctx.payment.issuer_country = "US".to_string();
        assert_eq!(scorer().payment_score(&ctx), 150 + 200 + 100);
    }

    #[test]
    fn test_average_multiple_skipped_for_new_customers() {
        let mut ctx = context();
        ctx.customer.total_orders = 0;
        ctx.customer.total_spent = Decimal::ZERO;
        ctx.payment.amount = Decimal::from(120);

        // A first order has no meaningful average to compare against
        assert_eq!(scorer().payment_score(&ctx), 0);
    }
}
