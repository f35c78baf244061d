//! Real-time fraud and risk scoring for checkout traffic
//!
//! Given one checkout attempt (customer, payment instrument, IP geolocation
//! and raw device telemetry), the engine produces a normalized
//! [`FraudRiskAssessment`]: a 0-1000 overall score, a risk level, an
//! approve/review/decline recommendation, explainable risk factors and a
//! chargeback likelihood estimate.
//!
//! # Architecture
//!
//! - **Injected state**: fingerprint and velocity history live behind the
//!   [`store::RiskStore`] trait; time comes from [`clock::Clock`]
//! - **Per-key serialization**: racing assessments on the same email, IP or
//!   device never lose updates; independent keys never contend
//! - **Failsafe bias**: any internal failure degrades to a medium-risk
//!   "review" assessment, never an automatic approve or decline
//! - **Fixed heuristics**: every weight, threshold and probability delta is
//!   a hand-tuned constant, not a trained model parameter

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod aggregator;
pub mod chargeback;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod geo;
pub mod store;
pub mod types;
pub mod velocity;

// Re-exports
pub use chargeback::{ChargebackPredictor, ChargebackPrediction, ChargebackRiskFactors};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RiskConfig;
pub use engine::FraudEngine;
pub use error::{Error, Result};
pub use fingerprint::{DeviceFingerprint, DeviceFingerprintRegistry};
pub use store::{Dimension, MemoryRiskStore, OrderEvent, RiskStore};
pub use types::{
    FraudRiskAssessment, OrderContext, Recommendation, RiskBand, RiskFactor, RiskLevel,
};
pub use velocity::{VelocityCheck, VelocityTracker};
