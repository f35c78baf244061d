//! Configuration for the fraud engine
//!
//! The static risk tables (high-risk countries, high-risk BIN prefixes,
//! disposable email domains) are plain config so operations can swap them
//! without a code change. Scoring thresholds are documented constants in the
//! scorer modules; they are part of the model, not deployment config.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Fraud engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// ISO country codes treated as high fraud risk
    pub high_risk_countries: Vec<String>,

    /// Card BIN prefixes treated as high fraud risk
    pub high_risk_bins: Vec<String>,

    /// Disposable / throwaway email domains
    pub disposable_email_domains: Vec<String>,

    /// Component weights for the overall score
    pub weights: ScoreWeights,

    /// Background maintenance configuration
    pub sweep: SweepConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_risk_countries: ["NG", "GH", "PK", "BD", "MM", "KH"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            high_risk_bins: ["4000", "4111", "5555"]
                .iter()
                .map(|b| b.to_string())
                .collect(),
            disposable_email_domains: ["tempmail.org", "10minutemail.com"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            weights: ScoreWeights::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl RiskConfig {
    /// Validate the configuration
    ///
    /// The component weights must be non-negative and sum to 1.0; anything
    /// else silently skews every overall score.
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let parts = [w.velocity, w.device, w.geographic, w.payment, w.chargeback];
        if parts.iter().any(|p| *p < 0.0) {
            return Err(Error::InvalidConfig(
                "score weights must be non-negative".to_string(),
            ));
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::InvalidConfig(format!(
                "score weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }

    /// Check whether a country code is in the high-risk set
    pub fn is_high_risk_country(&self, country: &str) -> bool {
        self.high_risk_countries.iter().any(|c| c == country)
    }

    /// Check whether a card BIN matches a high-risk prefix
    pub fn is_high_risk_bin(&self, bin: &str) -> bool {
        !bin.is_empty() && self.high_risk_bins.iter().any(|p| bin.starts_with(p.as_str()))
    }

    /// Check whether an email uses a known disposable domain
    pub fn is_disposable_email(&self, email: &str) -> bool {
        match email.rsplit_once('@') {
            Some((_, domain)) => {
                let domain = domain.to_ascii_lowercase();
                self.disposable_email_domains.iter().any(|d| *d == domain)
            }
            None => false,
        }
    }
}

/// Component weights for the overall score (sum to 1.0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Velocity component weight
    pub velocity: f64,
    /// Device component weight
    pub device: f64,
    /// Geographic component weight
    pub geographic: f64,
    /// Payment component weight
    pub payment: f64,
    /// Chargeback-probability component weight
    pub chargeback: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            velocity: 0.25,
            device: 0.15,
            geographic: 0.20,
            payment: 0.20,
            chargeback: 0.20,
        }
    }
}

/// Background maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Sweep interval (hours)
    pub interval_hours: u64,

    /// Evict fingerprints inactive for this many days
    pub fingerprint_ttl_days: i64,

    /// Drop order events older than this many days
    pub event_retention_days: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,      // daily
            fingerprint_ttl_days: 90,
            event_retention_days: 7, // longest velocity window
        }
    }
}
