//! Core types for the fraud engine

use crate::chargeback::ChargebackPrediction;
use crate::fingerprint::DeviceFingerprint;
use crate::velocity::VelocityCheck;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Card product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    /// Credit card
    Credit,
    /// Debit card
    Debit,
    /// Prepaid card
    Prepaid,
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

/// Screen characteristics reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenProfile {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Color depth in bits
    pub color_depth: u32,
    /// Device pixel ratio
    pub pixel_ratio: f64,
}

impl Default for ScreenProfile {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            color_depth: 0,
            pixel_ratio: 1.0,
        }
    }
}

/// Raw device telemetry collected at checkout
///
/// Fields the client failed to collect default to empty/neutral values; the
/// fingerprint registry treats those as weak-fingerprint signals rather than
/// input errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceTelemetry {
    /// Browser user agent
    pub user_agent: String,
    /// Screen characteristics
    pub screen: ScreenProfile,
    /// IANA timezone name
    pub timezone: String,
    /// Browser language
    pub language: String,
    /// Platform string
    pub platform: String,
    /// Cookies enabled
    pub cookies_enabled: bool,
    /// Local storage available
    pub local_storage: bool,
    /// Session storage available
    pub session_storage: bool,
    /// Canvas fingerprint hash
    pub canvas: String,
    /// WebGL fingerprint hash
    pub webgl: String,
    /// Available system fonts
    pub fonts: Vec<String>,
    /// Browser plugins
    pub plugins: Vec<String>,
}

/// Customer identity and order history as known to the host platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Customer email address
    pub email: String,
    /// Account creation time
    pub created_at: DateTime<Utc>,
    /// Completed orders to date
    pub total_orders: u32,
    /// Total spend to date
    pub total_spent: Decimal,
    /// Prior chargebacks filed by this customer
    pub chargeback_count: u32,
    /// Prior disputes opened by this customer
    pub dispute_count: u32,
}

impl CustomerProfile {
    /// Historical average order value; zero for first-time customers
    pub fn average_order_value(&self) -> Decimal {
        if self.total_orders == 0 {
            Decimal::ZERO
        } else {
            self.total_spent / Decimal::from(self.total_orders)
        }
    }

    /// Days since account creation at the given instant
    pub fn account_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// Payment instrument details for the attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Opaque card token
    pub card_token: String,
    /// Last four digits
    pub card_last4: String,
    /// Bank identification number (leading digits)
    pub card_bin: String,
    /// Card issuer country code
    pub issuer_country: String,
    /// Card product type
    pub card_type: CardType,
    /// Order amount
    pub amount: Decimal,
    /// Known chargebacks against this instrument
    pub prior_chargebacks: u32,
}

/// IP-derived geolocation for the request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpGeo {
    /// Request IP address
    pub ip: String,
    /// Geolocated country code
    pub country: String,
    /// Geolocated city
    pub city: String,
    /// Geolocated coordinates, when the resolver provides them
    pub coords: Option<GeoPoint>,
    /// VPN exit node detected
    pub vpn_detected: bool,
    /// Open proxy detected
    pub proxy_detected: bool,
}

/// Billing address on the order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingAddress {
    /// Billing country code
    pub country: String,
    /// Billing city
    pub city: String,
    /// Geocoded coordinates, when available
    pub coords: Option<GeoPoint>,
}

/// Everything the engine consumes for one checkout attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderContext {
    /// Customer identity and history
    pub customer: CustomerProfile,
    /// Payment instrument
    pub payment: PaymentDetails,
    /// Request IP geolocation
    pub ip: IpGeo,
    /// Billing address
    pub billing: BillingAddress,
    /// Raw device telemetry
    pub telemetry: DeviceTelemetry,
}

/// Overall risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Overall score below 200
    VeryLow,
    /// Overall score 200-399
    Low,
    /// Overall score 400-599
    Medium,
    /// Overall score 600-799
    High,
    /// Overall score 800 and above
    VeryHigh,
}

/// Disposition recommendation
///
/// Thresholds are deliberately more conservative than the risk-level bands:
/// a transaction is recommended for decline at 700 while the very-high risk
/// band starts at 800.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Proceed without friction
    Approve,
    /// Light-touch review
    Review,
    /// Route to a human analyst
    ManualReview,
    /// Decline the transaction
    Decline,
}

/// Severity of a single risk factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational
    Low,
    /// Worth noting
    Medium,
    /// Strong signal
    High,
    /// Near-certain fraud signal
    Critical,
}

/// Category of a risk factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    /// Order/event rate signals
    Velocity,
    /// Device fingerprint signals
    Device,
    /// Location signals
    Geographic,
    /// Payment instrument signals
    Payment,
    /// Everything else, including engine-internal conditions
    Behavioral,
}

/// One explainable risk signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Signal category
    pub category: FactorCategory,
    /// Stable machine-readable factor name
    pub factor: String,
    /// Graded severity
    pub severity: Severity,
    /// Contribution magnitude, used for presentation ordering
    pub impact: u32,
    /// Human-readable description
    pub description: String,
}

/// Chargeback probability bucket, A lowest risk to E highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskBand {
    /// Probability below 2%
    A,
    /// Probability 2-4%
    B,
    /// Probability 4-8%
    C,
    /// Probability 8-15%
    D,
    /// Probability 15% and above
    E,
}

/// Action type proposed to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Approve the order
    Approve,
    /// Decline the order
    Decline,
    /// Light-touch review
    Review,
    /// Route to a human analyst
    ManualReview,
    /// Request additional verification
    Verify,
    /// Flag the order for the fraud team
    Flag,
    /// Approve but keep watching
    Monitor,
}

/// Action priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    /// Can wait
    Low,
    /// Should be looked at soon
    Medium,
    /// Needs immediate attention
    High,
}

/// One recommended action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAction {
    /// What to do
    pub action: ActionType,
    /// Why
    pub reason: String,
    /// How urgently
    pub priority: ActionPriority,
    /// Whether the action can be taken without a human
    pub automated: bool,
}

/// Terminal output of one assessment
///
/// Built once per `assess` call and never mutated afterwards; callers
/// serialize and persist it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRiskAssessment {
    /// Unique id for this assessment
    pub assessment_id: Uuid,

    /// Weighted overall score, 0-1000
    pub overall_score: u32,

    /// Risk level derived from the overall score
    pub risk_level: RiskLevel,

    /// Disposition recommendation derived from the overall score
    pub recommendation: Recommendation,

    /// Velocity component score, 0-1000
    pub velocity_score: u32,

    /// Device component score, 0-1000
    pub device_score: u32,

    /// Geographic component score, 0-1000
    pub geographic_score: u32,

    /// Payment component score, 0-1000
    pub payment_score: u32,

    /// Chargeback component score (probability x 1000), 0-950
    pub chargeback_score: u32,

    /// Explainable risk factors, ordered by descending impact
    pub risk_factors: Vec<RiskFactor>,

    /// Velocity snapshot used for scoring; absent on the failsafe path
    pub velocity_check: Option<VelocityCheck>,

    /// Resolved device fingerprint; absent on the failsafe path
    pub device_fingerprint: Option<DeviceFingerprint>,

    /// Chargeback prediction
    pub chargeback: ChargebackPrediction,

    /// Recommended actions
    pub actions: Vec<RecommendedAction>,

    /// End-to-end pipeline time in milliseconds
    pub processing_time_ms: u64,

    /// Assessment time
    pub timestamp: DateTime<Utc>,
}

impl FraudRiskAssessment {
    /// One-line summary for logs and case notes
    pub fn summary(&self) -> String {
        let level = match self.risk_level {
            RiskLevel::VeryLow => "VERY LOW",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY HIGH",
        };
        format!(
            "{} RISK ({}/1000) - {} risk factors identified",
            level,
            self.overall_score,
            self.risk_factors.len()
        )
    }
}
