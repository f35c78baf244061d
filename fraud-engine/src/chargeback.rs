//! Chargeback likelihood prediction
//!
//! A weighted additive factor model over a flattened snapshot of the order.
//! The deltas, the confidence formula and the base rate are hand-tuned
//! heuristics, not trained model parameters; confidence in particular is a
//! data-completeness measure, not a statistical posterior. Treat the output
//! as an ordering signal, never as a calibrated probability.

use crate::config::RiskConfig;
use crate::fingerprint::DeviceFingerprint;
use crate::types::{CardType, OrderContext};
use crate::velocity::VelocityCheck;
use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::geo::ip_billing_distance_km;
use crate::types::RiskBand;

/// Base chargeback rate before any factor deltas
pub const BASE_RATE: f64 = 0.02;

/// Hard ceiling on predicted probability; the model is never certain
pub const MAX_PROBABILITY: f64 = 0.95;

/// Flattened factor snapshot for one assessment, immutable once assembled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargebackRiskFactors {
    // Customer factors
    /// Days since account creation
    pub customer_age_days: i64,
    /// Completed orders to date
    pub total_orders: u32,
    /// Total spend to date
    pub total_spent: Decimal,
    /// Prior chargebacks
    pub chargeback_history: u32,
    /// Prior disputes
    pub dispute_history: u32,

    // Order factors
    /// This order's value
    pub order_value: Decimal,
    /// Historical average order value, zero when unknown
    pub avg_order_value: Decimal,
    /// Hour of day at assessment, 0-23
    pub hour_of_day: u32,
    /// Day of week at assessment, 0 = Sunday
    pub day_of_week: u32,

    // Geographic factors
    /// IP-geolocated country
    pub ip_country: String,
    /// Billing country
    pub billing_country: String,
    /// IP-to-billing distance, when both sides have coordinates
    pub distance_km: Option<f64>,
    /// Billing country is in the high-risk set
    pub high_risk_country: bool,

    // Payment factors
    /// Card product type
    pub card_type: CardType,
    /// Card issuer country
    pub card_country: String,
    /// Card BIN matches a high-risk prefix
    pub high_risk_bin: bool,

    // Velocity factors
    /// Email-dimension orders in the last 24 hours
    pub email_velocity_24h: u32,
    /// IP-dimension orders in the last 24 hours
    pub ip_velocity_24h: u32,
    /// Device-dimension orders in the last 24 hours
    pub device_velocity_24h: u32,

    // Digital factors
    /// Device risk score, 0-100
    pub device_risk: u32,
    /// Email risk score (disposable-domain heuristic), 0-100
    pub email_risk: u32,
    /// VPN exit detected
    pub vpn_usage: bool,
    /// Open proxy detected
    pub proxy_usage: bool,
}

impl ChargebackRiskFactors {
    /// Assemble the factor snapshot for one assessment
    pub fn from_context(
        ctx: &OrderContext,
        check: &VelocityCheck,
        fingerprint: &DeviceFingerprint,
        config: &RiskConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            customer_age_days: ctx.customer.account_age_days(now),
            total_orders: ctx.customer.total_orders,
            total_spent: ctx.customer.total_spent,
            chargeback_history: ctx.customer.chargeback_count,
            dispute_history: ctx.customer.dispute_count,
            order_value: ctx.payment.amount,
            avg_order_value: ctx.customer.average_order_value(),
            hour_of_day: now.hour(),
            day_of_week: now.weekday().num_days_from_sunday(),
            ip_country: ctx.ip.country.clone(),
            billing_country: ctx.billing.country.clone(),
            distance_km: ip_billing_distance_km(ctx),
            high_risk_country: config.is_high_risk_country(&ctx.billing.country),
            card_type: ctx.payment.card_type,
            card_country: ctx.payment.issuer_country.clone(),
            high_risk_bin: config.is_high_risk_bin(&ctx.payment.card_bin),
            email_velocity_24h: check.email.order_count_24h,
            ip_velocity_24h: check.ip.order_count_24h,
            device_velocity_24h: check.device.order_count_24h,
            device_risk: fingerprint.risk_score,
            email_risk: if config.is_disposable_email(&ctx.customer.email) {
                80
            } else {
                10
            },
            vpn_usage: ctx.ip.vpn_detected,
            proxy_usage: ctx.ip.proxy_detected,
        }
    }

    /// Neutral all-unknown snapshot, used when the pipeline could not
    /// assemble real factors
    pub fn unavailable() -> Self {
        Self {
            customer_age_days: 0,
            total_orders: 0,
            total_spent: Decimal::ZERO,
            chargeback_history: 0,
            dispute_history: 0,
            order_value: Decimal::ZERO,
            avg_order_value: Decimal::ZERO,
            hour_of_day: 0,
            day_of_week: 0,
            ip_country: String::new(),
            billing_country: String::new(),
            distance_km: None,
            high_risk_country: false,
            card_type: CardType::Credit,
            card_country: String::new(),
            high_risk_bin: false,
            email_velocity_24h: 0,
            ip_velocity_24h: 0,
            device_velocity_24h: 0,
            device_risk: 0,
            email_risk: 0,
            vpn_usage: false,
            proxy_usage: false,
        }
    }

    fn is_night(&self) -> bool {
        self.hour_of_day < 6 || self.hour_of_day > 22
    }

    fn is_weekend(&self) -> bool {
        self.day_of_week == 0 || self.day_of_week == 6
    }
}

/// Prediction output for one assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargebackPrediction {
    /// Predicted chargeback probability, clamped to [0, 0.95]
    pub probability: f64,
    /// Ordinal probability bucket, A lowest to E highest
    pub risk_band: RiskBand,
    /// Expected monetary loss (probability x order value x fee multiplier)
    pub expected_loss: Decimal,
    /// Data-completeness heuristic in [0.6, 0.95], not a posterior
    pub confidence: f64,
    /// The factor snapshot the prediction was computed from
    pub factors: ChargebackRiskFactors,
}

/// Stateless weighted-factor chargeback predictor
#[derive(Debug, Default)]
pub struct ChargebackPredictor;

impl ChargebackPredictor {
    /// Create a predictor
    pub fn new() -> Self {
        Self
    }

    /// Predict chargeback likelihood from the factor snapshot
    pub fn predict(&self, factors: ChargebackRiskFactors) -> ChargebackPrediction {
        let probability = probability(&factors);
        let risk_band = risk_band(probability);
        let confidence = confidence(&factors);

        // Losses run roughly double the order value once fees and
        // operational cost are included
        let expected_loss = factors.order_value
            * Decimal::from_f64(probability).unwrap_or_default()
            * Decimal::from(2);

        ChargebackPrediction {
            probability,
            risk_band,
            expected_loss,
            confidence,
            factors,
        }
    }
}

/// Additive probability model, clamped to [0, 0.95]
pub fn probability(factors: &ChargebackRiskFactors) -> f64 {
    let mut p = BASE_RATE;

    // Customer history
    if factors.customer_age_days < 7 {
        p += 0.03;
    }
    p += factors.chargeback_history as f64 * 0.15;
    if factors.total_orders == 0 {
        p += 0.02;
    }

    // Order value
    if factors.avg_order_value > Decimal::ZERO
        && factors.order_value > factors.avg_order_value * Decimal::from(3)
    {
        p += 0.04;
    }
    if factors.order_value > Decimal::from(500) {
        p += 0.02;
    }

    // Geography
    if matches!(factors.distance_km, Some(d) if d > 500.0) {
        p += 0.03;
    }
    if factors.high_risk_country {
        p += 0.05;
    }
    if factors.ip_country != factors.billing_country {
        p += 0.04;
    }

    // Payment instrument
    if factors.card_type == CardType::Prepaid {
        p += 0.06;
    }
    if factors.high_risk_bin {
        p += 0.08;
    }

    // Velocity
    if factors.email_velocity_24h > 3 {
        p += 0.05;
    }
    if factors.ip_velocity_24h > 5 {
        p += 0.07;
    }

    // Digital signals
    if factors.vpn_usage {
        p += 0.04;
    }
    if factors.device_risk > 50 {
        p += 0.03;
    }

    // Fraud skews toward nights and weekends
    if factors.is_night() {
        p += 0.02;
    }
    if factors.is_weekend() {
        p += 0.01;
    }

    p.clamp(0.0, MAX_PROBABILITY)
}

/// Ordinal bucket for a probability; monotone by construction
pub fn risk_band(probability: f64) -> RiskBand {
    if probability >= 0.15 {
        RiskBand::E
    } else if probability >= 0.08 {
        RiskBand::D
    } else if probability >= 0.04 {
        RiskBand::C
    } else if probability >= 0.02 {
        RiskBand::B
    } else {
        RiskBand::A
    }
}

/// Data-completeness confidence in [0.6, 0.95]
///
/// Grows with each populated high-value input; this measures how much the
/// model had to work with, nothing more.
pub fn confidence(factors: &ChargebackRiskFactors) -> f64 {
    let mut confidence = 0.6_f64;

    if factors.total_orders > 0 {
        confidence += 0.1;
    }
    if factors.customer_age_days > 0 {
        confidence += 0.1;
    }
    if factors.distance_km.is_some() {
        confidence += 0.1;
    }
    if factors.avg_order_value > Decimal::ZERO {
        confidence += 0.1;
    }

    confidence.min(MAX_PROBABILITY)
}
