//! Assessment orchestration
//!
//! `FraudEngine` sequences fingerprint resolution, velocity snapshotting,
//! the stateless scorers and aggregation, and guarantees the caller always
//! receives a well-formed assessment. Any internal failure degrades to the
//! failsafe assessment (medium risk, review) so a broken pipeline sends
//! traffic to human review instead of silently approving or declining.

use crate::aggregator::{recommendation_for, risk_level_for, ComponentScores, RiskAggregator};
use crate::chargeback::{ChargebackPredictor, ChargebackPrediction, ChargebackRiskFactors};
use crate::clock::{Clock, SystemClock};
use crate::config::RiskConfig;
use crate::fingerprint::{device_score, DeviceFingerprintRegistry};
use crate::geo::GeoPaymentScorer;
use crate::store::{MemoryRiskStore, RiskStore};
use crate::types::{
    ActionPriority, ActionType, FactorCategory, FraudRiskAssessment, OrderContext, Recommendation,
    RecommendedAction, RiskBand, RiskFactor, RiskLevel, Severity,
};
use crate::velocity::{velocity_score, VelocityTracker};
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Real-time fraud assessment engine
pub struct FraudEngine {
    config: Arc<RiskConfig>,
    store: Arc<dyn RiskStore>,
    clock: Arc<dyn Clock>,
    registry: DeviceFingerprintRegistry,
    tracker: VelocityTracker,
    scorer: GeoPaymentScorer,
    predictor: ChargebackPredictor,
    aggregator: RiskAggregator,
}

impl FraudEngine {
    /// Engine with default configuration, in-memory state and wall-clock time
    pub fn new() -> Self {
        Self::with_parts(
            RiskConfig::default(),
            Arc::new(MemoryRiskStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Engine over explicit store and clock, for tests and embedding
    pub fn with_parts(
        config: RiskConfig,
        store: Arc<dyn RiskStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            registry: DeviceFingerprintRegistry::new(store.clone(), clock.clone()),
            tracker: VelocityTracker::new(store.clone(), clock.clone()),
            scorer: GeoPaymentScorer::new(config.clone()),
            predictor: ChargebackPredictor::new(),
            aggregator: RiskAggregator::new(config.clone()),
            config,
            store,
            clock,
        }
    }

    /// Assess one checkout attempt
    ///
    /// Never fails: internal errors are logged and converted to the
    /// failsafe assessment. The returned value is complete and immutable;
    /// callers persist it verbatim.
    pub fn assess(&self, ctx: &OrderContext) -> FraudRiskAssessment {
        let started = Instant::now();

        let mut assessment = match self.run_pipeline(ctx) {
            Ok(assessment) => assessment,
            Err(e) => {
                error!("Fraud assessment failed, returning failsafe: {}", e);
                self.failsafe_assessment()
            }
        };
        assessment.processing_time_ms = started.elapsed().as_millis() as u64;

        match assessment.recommendation {
            Recommendation::Decline => warn!(
                "Declined order for {}: score {}",
                ctx.customer.email, assessment.overall_score
            ),
            _ => debug!(
                "Assessed order for {}: score {} ({:?})",
                ctx.customer.email, assessment.overall_score, assessment.recommendation
            ),
        }

        assessment
    }

    fn run_pipeline(&self, ctx: &OrderContext) -> Result<FraudRiskAssessment> {
        self.config.validate()?;
        validate(ctx)?;
        let now = self.clock.now();

        let fingerprint = self.registry.resolve(&ctx.telemetry, Some(&ctx.ip));
        let check = self.tracker.snapshot(ctx, &fingerprint.id);

        let factors =
            ChargebackRiskFactors::from_context(ctx, &check, &fingerprint, &self.config, now);
        let prediction = self.predictor.predict(factors);

        let scores = ComponentScores {
            velocity: velocity_score(&check),
            device: device_score(&fingerprint, &ctx.telemetry),
            geographic: self.scorer.geographic_score(ctx),
            payment: self.scorer.payment_score(ctx),
            chargeback_probability: prediction.probability,
        };

        let overall_score = self.aggregator.overall_score(&scores);
        let risk_level = risk_level_for(overall_score);
        let recommendation = recommendation_for(overall_score);
        let risk_factors = self.aggregator.risk_factors(ctx, &check, &fingerprint);
        let actions = self.aggregator.actions(risk_level, &risk_factors);

        Ok(FraudRiskAssessment {
            assessment_id: Uuid::new_v4(),
            overall_score,
            risk_level,
            recommendation,
            velocity_score: scores.velocity,
            device_score: scores.device,
            geographic_score: scores.geographic,
            payment_score: scores.payment,
            chargeback_score: scores.chargeback_score(),
            risk_factors,
            velocity_check: Some(check),
            device_fingerprint: Some(fingerprint),
            chargeback: prediction,
            actions,
            processing_time_ms: 0,
            timestamp: now,
        })
    }

    /// Fixed conservative assessment for pipeline failures
    ///
    /// Deliberately lands in the review band: a transient failure routes
    /// to a human, never to an automatic approve or decline.
    fn failsafe_assessment(&self) -> FraudRiskAssessment {
        FraudRiskAssessment {
            assessment_id: Uuid::new_v4(),
            overall_score: 500,
            risk_level: RiskLevel::Medium,
            recommendation: Recommendation::Review,
            velocity_score: 250,
            device_score: 250,
            geographic_score: 0,
            payment_score: 0,
            chargeback_score: 0,
            risk_factors: vec![RiskFactor {
                category: FactorCategory::Behavioral,
                factor: "assessment_error".to_string(),
                severity: Severity::Medium,
                impact: 500,
                description: "Unable to complete full fraud assessment".to_string(),
            }],
            velocity_check: None,
            device_fingerprint: None,
            chargeback: ChargebackPrediction {
                probability: 0.05,
                risk_band: RiskBand::C,
                expected_loss: Decimal::ZERO,
                confidence: 0.3,
                factors: ChargebackRiskFactors::unavailable(),
            },
            actions: vec![RecommendedAction {
                action: ActionType::Review,
                reason: "Manual review required due to assessment error".to_string(),
                priority: ActionPriority::Medium,
                automated: false,
            }],
            processing_time_ms: 0,
            timestamp: self.clock.now(),
        }
    }

    /// Launch the periodic maintenance task
    ///
    /// Evicts fingerprints inactive past the configured TTL and drops order
    /// events that have aged out of the longest velocity window. Runs until
    /// the handle is aborted; safe to race with concurrent assessments.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let clock = self.clock.clone();
        let sweep = self.config.sweep.clone();

        tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(sweep.interval_hours * 3600));
            // the first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = clock.now();
                let evicted =
                    store.sweep_fingerprints(now - chrono::Duration::days(sweep.fingerprint_ttl_days));
                let pruned =
                    store.prune_events(now - chrono::Duration::days(sweep.event_retention_days));
                info!(
                    "Risk state sweep: evicted {} fingerprints, pruned {} events, {} tracked",
                    evicted,
                    pruned,
                    store.fingerprint_count()
                );
            }
        })
    }
}

impl Default for FraudEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(ctx: &OrderContext) -> Result<()> {
    if ctx.customer.email.is_empty() {
        return Err(Error::InvalidOrder("customer email is empty".to_string()));
    }
    if ctx.payment.amount < Decimal::ZERO {
        return Err(Error::InvalidOrder(format!(
            "negative order amount: {}",
            ctx.payment.amount
        )));
    }
    Ok(())
}
