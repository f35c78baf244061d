//! Score aggregation, risk grading and action proposals
//!
//! Combines the component scores into one 0-1000 overall score, grades it,
//! and extracts explainable risk factors from the raw inputs rather than
//! from the component scores, so an analyst can see why an order was
//! graded the way it was.

use crate::config::RiskConfig;
use crate::fingerprint::DeviceFingerprint;
use crate::types::{
    ActionPriority, ActionType, CardType, FactorCategory, OrderContext, Recommendation,
    RecommendedAction, RiskFactor, RiskLevel, Severity,
};
use crate::velocity::VelocityCheck;
use std::sync::Arc;

/// Risk level band edges on the overall score
const VERY_HIGH_AT: u32 = 800;
const HIGH_AT: u32 = 600;
const MEDIUM_AT: u32 = 400;
const LOW_AT: u32 = 200;

/// Recommendation edges; deliberately more conservative than the bands
const DECLINE_AT: u32 = 700;
const MANUAL_REVIEW_AT: u32 = 500;
const REVIEW_AT: u32 = 300;

/// Component scores feeding the weighted overall score
#[derive(Debug, Clone, Copy)]
pub struct ComponentScores {
    /// Velocity component, 0-1000
    pub velocity: u32,
    /// Device component, 0-1000
    pub device: u32,
    /// Geographic component, 0-1000
    pub geographic: u32,
    /// Payment component, 0-1000
    pub payment: u32,
    /// Chargeback probability, [0, 0.95]
    pub chargeback_probability: f64,
}

impl ComponentScores {
    /// Chargeback component on the 0-1000 scale
    pub fn chargeback_score(&self) -> u32 {
        (self.chargeback_probability * 1000.0).round() as u32
    }
}

/// Risk level for an overall score
pub fn risk_level_for(score: u32) -> RiskLevel {
    if score >= VERY_HIGH_AT {
        RiskLevel::VeryHigh
    } else if score >= HIGH_AT {
        RiskLevel::High
    } else if score >= MEDIUM_AT {
        RiskLevel::Medium
    } else if score >= LOW_AT {
        RiskLevel::Low
    } else {
        RiskLevel::VeryLow
    }
}

/// Recommendation for an overall score
pub fn recommendation_for(score: u32) -> Recommendation {
    if score >= DECLINE_AT {
        Recommendation::Decline
    } else if score >= MANUAL_REVIEW_AT {
        Recommendation::ManualReview
    } else if score >= REVIEW_AT {
        Recommendation::Review
    } else {
        Recommendation::Approve
    }
}

/// Combines component scores and explains the result
pub struct RiskAggregator {
    config: Arc<RiskConfig>,
}

impl RiskAggregator {
    /// Create an aggregator over the given configuration
    pub fn new(config: Arc<RiskConfig>) -> Self {
        Self { config }
    }

    /// Weighted overall score, rounded and clamped to [0, 1000]
    pub fn overall_score(&self, scores: &ComponentScores) -> u32 {
        let w = &self.config.weights;
        let weighted = scores.velocity as f64 * w.velocity
            + scores.device as f64 * w.device
            + scores.geographic as f64 * w.geographic
            + scores.payment as f64 * w.payment
            + scores.chargeback_probability * 1000.0 * w.chargeback;

        (weighted.round() as u32).min(1000)
    }

    /// Extract explainable risk factors from the raw inputs
    ///
    /// Returned descending by impact for presentation.
    pub fn risk_factors(
        &self,
        ctx: &OrderContext,
        check: &VelocityCheck,
        fingerprint: &DeviceFingerprint,
    ) -> Vec<RiskFactor> {
        let mut factors = Vec::new();

        if check.email.order_count_24h > 2 {
            factors.push(RiskFactor {
                category: FactorCategory::Velocity,
                factor: "high_email_velocity".to_string(),
                severity: if check.email.order_count_24h > 5 {
                    Severity::Critical
                } else {
                    Severity::High
                },
                impact: check.email.order_count_24h * 50,
                description: format!(
                    "Email used in {} orders in 24h",
                    check.email.order_count_24h
                ),
            });
        }

        if check.ip.order_count_24h > 5 {
            factors.push(RiskFactor {
                category: FactorCategory::Velocity,
                factor: "high_ip_velocity".to_string(),
                severity: if check.ip.order_count_24h > 10 {
                    Severity::Critical
                } else {
                    Severity::High
                },
                impact: check.ip.order_count_24h * 40,
                description: format!("IP placed {} orders in 24h", check.ip.order_count_24h),
            });
        }

        if check.card.prior_chargebacks > 0 {
            factors.push(RiskFactor {
                category: FactorCategory::Payment,
                factor: "card_chargeback_history".to_string(),
                severity: Severity::Critical,
                impact: 300,
                description: format!(
                    "Card has {} prior chargebacks",
                    check.card.prior_chargebacks
                ),
            });
        }

        if check.ip.vpn_detected {
            factors.push(RiskFactor {
                category: FactorCategory::Device,
                factor: "vpn_detected".to_string(),
                severity: Severity::Medium,
                impact: 100,
                description: "VPN usage detected".to_string(),
            });
        }

        if check.ip.proxy_detected {
            factors.push(RiskFactor {
                category: FactorCategory::Device,
                factor: "proxy_detected".to_string(),
                severity: Severity::High,
                impact: 150,
                description: "Open proxy detected".to_string(),
            });
        }

        if fingerprint.use_count == 1 {
            factors.push(RiskFactor {
                category: FactorCategory::Device,
                factor: "new_device".to_string(),
                severity: Severity::Low,
                impact: 50,
                description: "First time seeing this device".to_string(),
            });
        }

        let countries = fingerprint.distinct_countries();
        if countries > 2 {
            factors.push(RiskFactor {
                category: FactorCategory::Geographic,
                factor: "multiple_countries".to_string(),
                severity: Severity::High,
                impact: 150,
                description: format!("Device used from {countries} different countries"),
            });
        }

        if ctx.ip.country != ctx.billing.country {
            factors.push(RiskFactor {
                category: FactorCategory::Geographic,
                factor: "country_mismatch".to_string(),
                severity: Severity::Medium,
                impact: 150,
                description: format!(
                    "IP country {} does not match billing country {}",
                    ctx.ip.country, ctx.billing.country
                ),
            });
        }

        if ctx.payment.card_type == CardType::Prepaid {
            factors.push(RiskFactor {
                category: FactorCategory::Payment,
                factor: "prepaid_card".to_string(),
                severity: Severity::Medium,
                impact: 150,
                description: "Prepaid card presented".to_string(),
            });
        }

        if self.config.is_disposable_email(&ctx.customer.email) {
            factors.push(RiskFactor {
                category: FactorCategory::Behavioral,
                factor: "disposable_email".to_string(),
                severity: Severity::High,
                impact: 100,
                description: "Disposable email domain".to_string(),
            });
        }

        factors.sort_by(|a, b| b.impact.cmp(&a.impact));
        factors
    }

    /// Proposed actions for a risk level, plus a flag when any factor is
    /// critical
    pub fn actions(&self, level: RiskLevel, factors: &[RiskFactor]) -> Vec<RecommendedAction> {
        let mut actions = vec![match level {
            RiskLevel::VeryHigh => RecommendedAction {
                action: ActionType::Decline,
                reason: "Extremely high fraud risk detected".to_string(),
                priority: ActionPriority::High,
                automated: true,
            },
            RiskLevel::High => RecommendedAction {
                action: ActionType::ManualReview,
                reason: "High risk transaction requires manual review".to_string(),
                priority: ActionPriority::High,
                automated: false,
            },
            RiskLevel::Medium => RecommendedAction {
                action: ActionType::Review,
                reason: "Additional verification recommended".to_string(),
                priority: ActionPriority::Medium,
                automated: false,
            },
            RiskLevel::Low => RecommendedAction {
                action: ActionType::Monitor,
                reason: "Low risk but continue monitoring".to_string(),
                priority: ActionPriority::Low,
                automated: true,
            },
            RiskLevel::VeryLow => RecommendedAction {
                action: ActionType::Approve,
                reason: "Very low fraud risk".to_string(),
                priority: ActionPriority::Low,
                automated: true,
            },
        }];

        let critical: Vec<&str> = factors
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .map(|f| f.factor.as_str())
            .collect();
        if !critical.is_empty() {
            actions.push(RecommendedAction {
                action: ActionType::Flag,
                reason: format!("Critical risk factors detected: {}", critical.join(", ")),
                priority: ActionPriority::High,
                automated: true,
            });
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> RiskAggregator {
        RiskAggregator::new(Arc::new(RiskConfig::default()))
    }

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(risk_level_for(0), RiskLevel::VeryLow);
        assert_eq!(risk_level_for(199), RiskLevel::VeryLow);
        assert_eq!(risk_level_for(200), RiskLevel::Low);
        assert_eq!(risk_level_for(399), RiskLevel::Low);
        assert_eq!(risk_level_for(400), RiskLevel::Medium);
        assert_eq!(risk_level_for(599), RiskLevel::Medium);
        assert_eq!(risk_level_for(600), RiskLevel::High);
        assert_eq!(risk_level_for(799), RiskLevel::High);
        assert_eq!(risk_level_for(800), RiskLevel::VeryHigh);
        assert_eq!(risk_level_for(1000), RiskLevel::VeryHigh);
    }

    #[test]
    fn test_recommendation_boundaries() {
        assert_eq!(recommendation_for(299), Recommendation::Approve);
        assert_eq!(recommendation_for(300), Recommendation::Review);
        assert_eq!(recommendation_for(499), Recommendation::Review);
        assert_eq!(recommendation_for(500), Recommendation::ManualReview);
        assert_eq!(recommendation_for(699), Recommendation::ManualReview);
        assert_eq!(recommendation_for(700), Recommendation::Decline);
    }

    #[test]
    fn test_weighted_overall_score() {
        let scores = ComponentScores {
            velocity: 400,
            device: 200,
            geographic: 300,
            payment: 500,
            chargeback_probability: 0.10,
        };
        // 100 + 30 + 60 + 100 + 20
        assert_eq!(aggregator().overall_score(&scores), 310);
        assert_eq!(scores.chargeback_score(), 100);
    }

    #[test]
    fn test_overall_score_is_clamped() {
        let scores = ComponentScores {
            velocity: 1000,
            device: 1000,
            geographic: 1000,
            payment: 1000,
            chargeback_probability: 0.95,
        };
        assert!(aggregator().overall_score(&scores) <= 1000);
    }

    #[test]
    fn test_actions_table() {
        let agg = aggregator();

        let decline = agg.actions(RiskLevel::VeryHigh, &[]);
        assert_eq!(decline[0].action, ActionType::Decline);
        assert!(decline[0].automated);

        let review = agg.actions(RiskLevel::High, &[]);
        assert_eq!(review[0].action, ActionType::ManualReview);
        assert!(!review[0].automated);

        let approve = agg.actions(RiskLevel::VeryLow, &[]);
        assert_eq!(approve[0].action, ActionType::Approve);
    }

    #[test]
    fn test_critical_factor_appends_flag() {
        let factor = RiskFactor {
            category: FactorCategory::Velocity,
            factor: "high_email_velocity".to_string(),
            severity: Severity::Critical,
            impact: 300,
            description: "Email used in 6 orders in 24h".to_string(),
        };

        let actions = aggregator().actions(RiskLevel::Medium, &[factor]);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].action, ActionType::Flag);
        assert!(actions[1].reason.contains("high_email_velocity"));
    }
}
